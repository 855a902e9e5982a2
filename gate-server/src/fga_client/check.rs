use crate::fga_client::{FgaError, HttpFgaClient};
use crate::models::{fga_user, AccessQuery};
use serde::{Deserialize, Serialize};

/// Relationship tuple as understood by the authorization service
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TupleKey {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl From<&AccessQuery> for TupleKey {
    fn from(query: &AccessQuery) -> Self {
        Self {
            user: fga_user(&query.principal),
            relation: query.relation.clone(),
            object: query.resource.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    authorization_model_id: &'a str,
    tuple_key: TupleKey,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

impl HttpFgaClient {
    /// Single check call, without retries
    pub(super) async fn post_check(&self, query: &AccessQuery) -> Result<bool, FgaError> {
        let request = CheckRequest {
            authorization_model_id: &self.config.model_id,
            tuple_key: query.into(),
        };
        let response: CheckResponse = self.send("check", &request).await?;
        Ok(response.allowed)
    }
}
