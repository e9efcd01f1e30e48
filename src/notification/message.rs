use serde::Deserialize;
use serde::Serialize;

use crate::FieldValues;
use crate::Result;
use crate::StoreError;

/// One broadcast notification: an operation name, a data string and
/// field-value pairs. Carries no key and no row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub op: String,
    pub data: String,
    pub fields: FieldValues,
}

impl NotificationMessage {
    pub fn new(
        op: impl Into<String>,
        data: impl Into<String>,
        fields: FieldValues,
    ) -> Self {
        Self {
            op: op.into(),
            data: data.into(),
            fields,
        }
    }

    pub fn into_tuple(self) -> (String, String, FieldValues) {
        (self.op, self.data, self.fields)
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| crate::Error::Fatal(format!("Failed to encode notification: {e}")))
    }

    pub(crate) fn decode(
        channel: &str,
        payload: &[u8],
    ) -> Result<Self> {
        bincode::deserialize(payload).map_err(|e| StoreError::malformed(channel, e).into())
    }
}
