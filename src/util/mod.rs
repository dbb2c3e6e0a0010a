pub mod gemini;
pub mod llm;
pub mod openai;
pub mod qdrant;
pub mod quiz_parser;
pub mod similarity;
