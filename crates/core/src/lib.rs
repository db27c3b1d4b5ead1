pub mod config;
pub mod error;
pub mod instrument;
pub mod model;

pub use config::{Config, PoolConfig, load_dotenv};
pub use error::CoreError;
pub use instrument::{Instrument, INDUSTRY_KEYS, OCEAN_CATEGORIES, RIASEC_CATEGORIES, VIA_CATEGORIES};
pub use model::{AnswerSet, Question, QuestionCatalog, QuestionId};
