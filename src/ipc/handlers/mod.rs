pub mod core;
pub mod enrollments;
pub mod grades;
pub mod quizzes;
pub mod stats;
pub mod subjects;
pub mod users;
