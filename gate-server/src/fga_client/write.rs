use crate::fga_client::check::TupleKey;
use crate::fga_client::{FgaError, HttpFgaClient};
use crate::models::AccessQuery;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    authorization_model_id: &'a str,
    writes: TupleKeys,
}

#[derive(Debug, Serialize)]
struct TupleKeys {
    tuple_keys: Vec<TupleKey>,
}

/// The service answers a write with an empty object
#[derive(Debug, Deserialize)]
struct WriteResponse {}

impl HttpFgaClient {
    pub(super) async fn post_write(&self, tuple: &AccessQuery) -> Result<(), FgaError> {
        let request = WriteRequest {
            authorization_model_id: &self.config.model_id,
            writes: TupleKeys {
                tuple_keys: vec![tuple.into()],
            },
        };
        let _: WriteResponse = self.send("write", &request).await?;
        Ok(())
    }
}
