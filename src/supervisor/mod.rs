//! Supervisor 各节点：意图分类、计划、路由、结果记录、汇总、闲聊回复，以及提示词与过程事件

pub mod aggregator;
pub mod events;
pub mod intent;
pub mod planner;
pub mod prompts;
pub mod recorder;
pub mod responder;
pub mod router;

pub use aggregator::{render_summary, Aggregator};
pub use events::{EventSender, SupervisorEvent};
pub use intent::{Classification, ClassificationParseError, ClassificationSource, IntentClassifier};
pub use planner::{parse_plan, strip_code_fences, PlanOutcome, PlanParseError, Planner};
pub use recorder::{extract_result_text, is_failure_text, record_failure, record_result};
pub use responder::SimpleResponder;
pub use router::{route, RouteDecision};
