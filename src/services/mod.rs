pub mod bootstrap;
pub mod draw_collector;
pub mod draw_payload;
pub mod issue_service;
pub mod order_service;
pub mod outcome;
pub mod projection;
pub mod settlement;

pub use draw_collector::DrawCollector;
pub use issue_service::IssueService;
pub use order_service::{OrderDetail, OrderResult, OrderService, PlaceOrderRequest, SelectionRequest};
pub use outcome::{OutcomeResolver, StoreOutcomeResolver};
pub use projection::{CurrentRound, DrawSummary};
pub use settlement::{CycleReport, SettlementEngine};
