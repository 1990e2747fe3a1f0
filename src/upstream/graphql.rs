//! GraphQL client for the upstream services
//!
//! Plain POSTs of query documents with a JSON envelope; the documents
//! mirror the upstream schemas field for field.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::model::{EntityKind, Replicated};

use super::{Fetch, FetchError};

/// Query documents and response node names for one entity kind.
struct QueryDoc {
    all: &'static str,
    one: &'static str,
    /// Top-level node wrapping this kind's queries in the response data.
    node: &'static str,
    /// Field holding the single-entity result under the node.
    single_field: &'static str,
}

const MEMBER_DOC: QueryDoc = QueryDoc {
    all: "query GetAllMembers { membersGraph { all { id name } } }",
    one: "query GetMember($id: ID) { membersGraph { member(id: $id) { id name } } }",
    node: "membersGraph",
    single_field: "member",
};

const CONCERT_DOC: QueryDoc = QueryDoc {
    all: "query GetAllConcerts { concertGraph { all { id title } } }",
    one: "query GetConcert($id: ID) { concertGraph { concert(id: $id) { id title } } }",
    node: "concertGraph",
    single_field: "concert",
};

const REHEARSAL_DOC: QueryDoc = QueryDoc {
    all: "query GetAllRehearsals { rehearsalGraph { all { id title } } }",
    one: "query GetRehearsal($id: ID) { rehearsalGraph { rehearsal(id: $id) { id title } } }",
    node: "rehearsalGraph",
    single_field: "rehearsal",
};

fn doc(kind: EntityKind) -> &'static QueryDoc {
    match kind {
        EntityKind::Member => &MEMBER_DOC,
        EntityKind::Concert => &CONCERT_DOC,
        EntityKind::Rehearsal => &REHEARSAL_DOC,
    }
}

/// GraphQL fetch client over both upstream endpoints
#[derive(Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    members_url: String,
    planning_url: String,
}

impl GraphQlClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            members_url: config.members_url.clone(),
            planning_url: config.planning_url.clone(),
        }
    }

    fn endpoint(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Member => &self.members_url,
            EntityKind::Concert | EntityKind::Rehearsal => &self.planning_url,
        }
    }

    /// POST one query document and return the `data` object.
    async fn execute(
        &self,
        kind: EntityKind,
        query: &str,
        variables: Option<Value>,
    ) -> Result<Value, FetchError> {
        let mut body = serde_json::json!({ "query": query });
        if let Some(variables) = variables {
            body["variables"] = variables;
        }

        let response = self
            .http
            .post(self.endpoint(kind))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let envelope: Value = response.json().await?;
        parse_envelope(envelope)
    }
}

/// Pull `data` out of a response envelope, surfacing GraphQL errors.
fn parse_envelope(envelope: Value) -> Result<Value, FetchError> {
    if let Some(errors) = envelope.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let message = errors[0]
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown graphql error");
            return Err(FetchError::Graph(message.to_string()));
        }
    }

    match envelope.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Err(FetchError::Schema("response has no data".to_string())),
    }
}

/// Decode the `all` list for one kind out of the `data` object.
///
/// A null list means the service has no rows, not a schema violation.
fn parse_all<E: Replicated>(data: &Value) -> Result<Vec<E>, FetchError> {
    let doc = doc(E::KIND);
    let list = data
        .get(doc.node)
        .and_then(|node| node.get("all"))
        .ok_or_else(|| FetchError::Schema(format!("missing {}.all", doc.node)))?;

    if list.is_null() {
        return Ok(Vec::new());
    }

    serde_json::from_value(list.clone()).map_err(|e| FetchError::Schema(e.to_string()))
}

/// Decode the single-entity field for one kind; a null entity is NotFound.
fn parse_one<E: Replicated>(data: &Value) -> Result<E, FetchError> {
    let doc = doc(E::KIND);
    let entity = data
        .get(doc.node)
        .and_then(|node| node.get(doc.single_field))
        .ok_or_else(|| {
            FetchError::Schema(format!("missing {}.{}", doc.node, doc.single_field))
        })?;

    if entity.is_null() {
        return Err(FetchError::NotFound);
    }

    serde_json::from_value(entity.clone()).map_err(|e| FetchError::Schema(e.to_string()))
}

#[async_trait]
impl Fetch for GraphQlClient {
    async fn fetch_all<E: Replicated>(&self) -> Result<Vec<E>, FetchError> {
        let data = self.execute(E::KIND, doc(E::KIND).all, None).await?;
        parse_all(&data)
    }

    async fn fetch_one<E: Replicated>(&self, id: i64) -> Result<E, FetchError> {
        if id < 1 {
            return Err(FetchError::Schema(format!("non-positive id {}", id)));
        }

        let variables = serde_json::json!({ "id": id });
        let data = self
            .execute(E::KIND, doc(E::KIND).one, Some(variables))
            .await?;
        parse_one(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Concert, Member};
    use serde_json::json;

    #[test]
    fn parses_entity_lists() {
        let data = json!({
            "membersGraph": { "all": [ { "id": 1, "name": "Ada" }, { "id": 2, "name": "Grace" } ] }
        });

        let members: Vec<Member> = parse_all(&data).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].name, "Grace");
    }

    #[test]
    fn null_list_is_empty() {
        let data = json!({ "concertGraph": { "all": null } });
        let concerts: Vec<Concert> = parse_all(&data).unwrap();
        assert!(concerts.is_empty());
    }

    #[test]
    fn null_entity_is_not_found() {
        let data = json!({ "concertGraph": { "concert": null } });
        let err = parse_one::<Concert>(&data).unwrap_err();
        assert!(matches!(err, FetchError::NotFound));
    }

    #[test]
    fn wrong_shape_is_schema_error() {
        let data = json!({ "somethingElse": {} });
        let err = parse_one::<Member>(&data).unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));

        // A partially populated entity never deserializes.
        let data = json!({ "membersGraph": { "member": { "id": 3 } } });
        let err = parse_one::<Member>(&data).unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));
    }

    #[test]
    fn graphql_errors_win_over_data() {
        let envelope = json!({
            "data": { "membersGraph": { "all": [] } },
            "errors": [ { "message": "backend exploded" } ]
        });

        let err = parse_envelope(envelope).unwrap_err();
        assert!(matches!(err, FetchError::Graph(m) if m == "backend exploded"));
    }
}
