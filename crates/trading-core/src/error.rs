//! Error types for the strategy engine.
//!
//! Errors local to one trade or tick (`TradeError`) are reported and the run
//! continues. `DataError`, `StrategyError` and `ArithmeticError` are fatal to
//! the run that raised them and always end in a terminal stop event.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level error for a strategy run.
#[derive(Error, Debug, Clone)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Trade error: {0}")]
    Trade(#[from] TradeError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Data provider error: {0}")]
    Data(#[from] DataError),

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TradingError {
    /// Whether this error terminates the run that raised it.
    ///
    /// Trade-local failures (bad sizing, unknown trade, missing quote) are
    /// recoverable; everything else ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TradingError::Trade(_))
    }

    /// Short machine-readable tag used in error events.
    pub fn kind(&self) -> &'static str {
        match self {
            TradingError::Config(_) => "config",
            TradingError::Strategy(_) => "strategy",
            TradingError::Trade(_) => "trade",
            TradingError::Broker(_) => "broker",
            TradingError::Data(_) => "data_provider",
            TradingError::Arithmetic(_) => "arithmetic",
            TradingError::Executor(_) => "executor",
            TradingError::Analysis(_) => "analysis",
            TradingError::Internal(_) => "internal",
        }
    }
}

/// Fixed-precision arithmetic failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("division by zero: {dividend} / 0")]
    DivisionByZero { dividend: Decimal },

    #[error("decimal overflow in {0}")]
    Overflow(&'static str),

    #[error("value not representable as decimal: {0}")]
    NotRepresentable(String),
}

/// Trade lifecycle errors. These never terminate a run on their own.
#[derive(Error, Debug, Clone)]
pub enum TradeError {
    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Trade not found: {0}")]
    TradeNotFound(String),

    #[error("No price available for {0}")]
    PriceUnavailable(String),

    #[error("Sizing arithmetic failed: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("Broker rejected request: {0}")]
    Broker(#[from] BrokerError),
}

/// Strategy-specific errors.
#[derive(Error, Debug, Clone)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Strategy initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Strategy error: {0}")]
    Internal(String),
}

/// Broker collaborator errors (live mode).
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Trade not found at broker: {0}")]
    TradeNotFound(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Stream closed: {0}")]
    StreamClosed(String),

    #[error("API error: {0}")]
    ApiError(String),
}

/// Data source / data provider errors.
#[derive(Error, Debug, Clone)]
pub enum DataError {
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Feed timed out after {0} ms without data")]
    Timeout(u64),

    #[error("Price stream failed: {0}")]
    Stream(#[from] BrokerError),

    #[error("Data source error: {0}")]
    Internal(String),
}

/// Strategy executor lifecycle misuse.
#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    #[error("executor must be initialised before it can run (state: {0})")]
    NotInitialised(String),

    #[error("executor already initialised")]
    AlreadyInitialised,

    #[error("executor is already running")]
    AlreadyRunning,

    #[error("executor has terminated and cannot be reused")]
    AlreadyTerminated,
}

/// Performance analysis misuse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("statistics were already finalised for this run")]
    AlreadyFinalised,
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;
