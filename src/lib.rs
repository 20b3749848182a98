pub mod error;
pub mod options;
pub mod schema;
pub mod value;

mod loader;

use serde::de::DeserializeOwned;

pub use crate::error::{Error, ErrorKind, Location, Mark};
pub use crate::options::{Listener, LoadOptions};
pub use crate::schema::{Kind, Schema, Type};
pub use crate::value::{Mapping, Value};

pub type Result<T> = std::result::Result<T, Error>;

/// Parses a stream expected to hold at most one document. `Ok(None)` for an
/// empty stream; more than one document is an error.
pub fn load(input: &str) -> Result<Option<Value>> {
    load_with_options(input, LoadOptions::default())
}

pub fn load_with_options(input: &str, options: LoadOptions) -> Result<Option<Value>> {
    let mut documents = loader::load_documents(input, options)?;
    if documents.len() > 1 {
        return Err(Error::multiple_documents());
    }
    Ok(documents.pop())
}

/// Parses every document in the stream, in order.
pub fn load_all(input: &str) -> Result<Vec<Value>> {
    load_all_with_options(input, LoadOptions::default())
}

pub fn load_all_with_options(input: &str, options: LoadOptions) -> Result<Vec<Value>> {
    loader::load_documents(input, options)
}

/// Like `load_all`, but hands each document to `each` instead of collecting.
pub fn load_all_with<F: FnMut(Value)>(input: &str, options: LoadOptions, mut each: F) -> Result<()> {
    for document in loader::load_documents(input, options)? {
        each(document);
    }
    Ok(())
}

/// Deserializes a single-document stream into `T` through the serde data
/// model.
pub fn from_str<T: DeserializeOwned>(input: &str) -> Result<T> {
    from_str_with_options(input, LoadOptions::default())
}

pub fn from_str_with_options<T: DeserializeOwned>(input: &str, options: LoadOptions) -> Result<T> {
    let value = load_with_options(input, options)?.unwrap_or(Value::Null);
    serde_json::from_value(serde_json::Value::from(value))
        .map_err(|err| Error::deserialize(format!("deserialize failed: {err}")))
}
