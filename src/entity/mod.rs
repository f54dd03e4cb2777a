pub mod cache;
pub mod fsm;
pub mod relay;
