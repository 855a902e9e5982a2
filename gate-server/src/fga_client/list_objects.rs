use crate::fga_client::{FgaError, HttpFgaClient};
use crate::models::fga_user;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ListObjectsRequest<'a> {
    authorization_model_id: &'a str,
    r#type: &'a str,
    relation: &'a str,
    user: String,
}

#[derive(Debug, Deserialize)]
struct ListObjectsResponse {
    #[serde(default)]
    objects: Vec<String>,
}

impl HttpFgaClient {
    /// Single list-objects call, without retries
    pub(super) async fn post_list_objects(
        &self,
        principal: &str,
        relation: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, FgaError> {
        let request = ListObjectsRequest {
            authorization_model_id: &self.config.model_id,
            r#type: resource_type,
            relation,
            user: fga_user(principal),
        };
        let response: ListObjectsResponse = self.send("list-objects", &request).await?;
        Ok(response.objects)
    }
}
