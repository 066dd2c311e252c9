pub mod answer;
pub mod graded;
pub mod ledger;
pub mod loaders;
pub mod question;
pub mod student;

pub use answer::{AnswerValue, StudentAnswerRecord};
pub use graded::{same_score, AnswerRevise, GradedAnswer, GradingFailure, QuestionOutcome};
pub use ledger::{exam_number, ExamRecordEntry, HistoryLedger};
pub use loaders::{list_subdirectories, load_json, load_json_or_default, save_json};
pub use question::{
    choice_letters, compare_question_ids, normalize_choice, GradingScheme, QuestionMetadata,
    QuestionType, RawQuestionMetadata,
};
pub use student::StudentInfo;
