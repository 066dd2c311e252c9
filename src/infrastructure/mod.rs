pub mod metadata_store;
pub mod student_repo;

pub use metadata_store::QuestionMetadataStore;
pub use student_repo::StudentRepository;
