pub mod db;
pub mod insight_llm;
pub mod jwt;
pub mod pdf;

pub use db::DbAdapter;
pub use insight_llm::OpenAiInsightAdapter;
pub use jwt::{JwtVerifier, LegacyTokens, ProviderKeySet};
pub use pdf::PdfExtractAdapter;
