// Library surface for the exam engine; the UI layer stays out of here.
pub mod clock;
pub mod db;
pub mod error;
pub mod exam;
pub mod grade;
pub mod import;
pub mod model;
pub mod session;
pub mod stats;
pub mod time_series;
pub mod util;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::ExamDb;
pub use error::ExamError;
pub use exam::{start_exam, ActiveExam, ExamConfig};
pub use grade::{check_answer, submit_exam, ExamResult};
pub use session::{ExamSession, Phase};
