pub mod domain;
pub mod error;
pub mod feedback;
pub mod pipeline;
pub mod ports;
pub mod upload;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use domain::{
    AnalysisReport, AnalysisResult, AuthenticatedUser, NewAnalysisResult, Upload, User,
    UserCredentials,
};
pub use error::AnalysisError;
pub use feedback::ResultService;
pub use pipeline::AnalysisPipeline;
pub use ports::{
    CredentialVerifier, DatabaseService, InsightService, PdfTextService, PortError, PortResult,
};
