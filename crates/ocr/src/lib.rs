pub mod pipeline;
pub mod recognizer;
pub mod table;

pub use pipeline::{encode_image, PipelineError, ProcessedReceipt, ReceiptPipeline};
pub use recognizer::{MistralRecognizer, MockRecognizer, OcrBackend, OcrError, OcrPage};
pub use table::{ParseReport, Role, SkipReason, SkippedRow, TableParser};
