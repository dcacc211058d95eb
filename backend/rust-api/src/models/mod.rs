pub mod answer;
pub mod attempt;
pub mod bson_datetime;
pub mod quiz;
pub mod result;
pub mod status;

pub use answer::{Answer, StageAnswersRequest, SubmitAttemptRequest};
pub use attempt::{
    Attempt, AttemptListResponse, AttemptStatus, AttemptSummary, StartAttemptResponse,
};
pub use quiz::{
    LearnerOptionView, LearnerQuestionView, LearnerQuizView, Question, QuestionKind, Quiz,
    QuizOption,
};
pub use result::{AttemptResult, Grade, GradedAnswer};
pub use status::QuizStatusSummary;
