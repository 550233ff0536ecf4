//! Core traits for the strategy engine.

mod broker;
mod data_provider;
mod data_source;
mod publisher;
mod strategy;
mod task_store;
mod trade_manager;

pub use broker::{Broker, BrokerAccount, BrokerClose, BrokerTrade, BrokerTradeParams};
pub use data_provider::{DataListener, DataProvider, DataProviderListener};
pub use data_source::{CandleRequest, CandleSink, CandleSource, PriceStream, PriceUpdate};
pub use publisher::{EventListener, EventPublisher, ListenerError, ListenerId};
pub use strategy::{Strategy, StrategyAction, StrategyContext, StrategyState};
pub use task_store::{StoreError, TaskRecord, TaskStatus, TaskStore};
pub use trade_manager::{BalanceBasis, CloseAllOutcome, PositionSizing, TradeManager};
