//! Pipeline stages for flyer-to-deals extraction.
//!
//! Each submodule implements exactly one step, so every step can be tested
//! on its own and the network-facing one can be mocked.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ normalize ──▶ write
//! (globs)   (base64)  (model)  (repair+type)  (json/csv/html)
//! ```
//!
//! 1. [`input`]     — expand glob arguments and vet each candidate path
//! 2. [`encode`]    — read the PDF and base64-wrap it for the request body
//! 3. [`llm`]       — send document + prompt, get completion text; the only
//!    stage with network I/O
//! 4. [`normalize`] — strip fences, repair truncation, parse and coerce the
//!    records
//! 5. [`write`]     — filter unpriced records and write the output files

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod write;
