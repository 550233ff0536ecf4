//! Risk management for strategy runs.
//!
//! Provides position sizing and account-level loss and profit limits that are
//! evaluated per broker trading day.

mod position_sizer;
mod risk_manager;

pub use position_sizer::{PositionSizer, SizedPosition};
pub use risk_manager::{RiskManager, RiskProfile, RiskViolation};
