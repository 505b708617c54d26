//! GraphQL wire payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchyard_core::{Body, ClientError, Request, Result};

/// GraphQL request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    /// The GraphQL query or mutation.
    pub query: String,
    /// Operation name (for documents with multiple operations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Variables for the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLRequest {
    /// Create a new request.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
            extensions: None,
        }
    }

    /// Set the operation name.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Set variables.
    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Extract the payload from a client request.
    ///
    /// The `query`, `variables` and `operation_name` (or `operationName`)
    /// extensions take precedence; otherwise a JSON body shaped like a
    /// GraphQL payload is used.
    pub fn from_request(request: &Request) -> Result<Self> {
        let mut payload = match request.extension("query") {
            Some(Value::String(query)) => Self::new(query.clone()),
            Some(_) => return Err(ClientError::validation("GraphQL 'query' must be a string")),
            None => match request.body() {
                Some(Body::Json(body)) => serde_json::from_value(body.clone()).map_err(|e| {
                    ClientError::validation(format!("request body is not a GraphQL payload: {e}"))
                })?,
                _ => return Err(ClientError::validation("GraphQL request requires a 'query'")),
            },
        };

        if payload.query.trim().is_empty() {
            return Err(ClientError::validation("GraphQL query must not be empty"));
        }

        match request.extension("variables") {
            None | Some(Value::Null) => {}
            Some(variables @ Value::Object(_)) => payload.variables = Some(variables.clone()),
            Some(_) => {
                return Err(ClientError::validation("GraphQL 'variables' must be an object"));
            }
        }

        let operation_name = request
            .extension("operation_name")
            .or_else(|| request.extension("operationName"));
        if let Some(name) = operation_name {
            let name = name
                .as_str()
                .ok_or_else(|| ClientError::validation("GraphQL operation name must be a string"))?;
            payload.operation_name = Some(name.to_string());
        }
        Ok(payload)
    }
}

/// GraphQL response from the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphQLResponse<T = Value> {
    /// The data returned by the query/mutation.
    #[serde(default)]
    pub data: Option<T>,
    /// Errors returned by the server.
    #[serde(default)]
    pub errors: Option<Vec<GraphQLResponseError>>,
    /// Extensions (for tracing, caching info, etc.).
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl<T> GraphQLResponse<T> {
    /// Check if the response has errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Join all error messages.
    pub fn error_message(&self) -> Option<String> {
        let errors = self.errors.as_ref().filter(|e| !e.is_empty())?;
        Some(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A GraphQL error from the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphQLResponseError {
    /// Error message.
    pub message: String,
    /// Locations in the query where the error occurred.
    #[serde(default)]
    pub locations: Option<Vec<ErrorLocation>>,
    /// Path to the field that caused the error.
    #[serde(default)]
    pub path: Option<Vec<PathSegment>>,
    /// Additional error extensions.
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl std::fmt::Display for GraphQLResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(path) = &self.path
            && !path.is_empty()
        {
            write!(f, " (path: {})", format_path(path))?;
        }
        if let Some(locations) = &self.locations
            && !locations.is_empty()
        {
            write!(f, " at ")?;
            for (i, loc) in locations.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}:{}", loc.line, loc.column)?;
            }
        }
        Ok(())
    }
}

/// Location in the GraphQL query.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorLocation {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

/// Path segment in a GraphQL error.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Field name.
    Field(String),
    /// Array index.
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{}", name),
            Self::Index(idx) => write!(f, "[{}]", idx),
        }
    }
}

/// Format a path as a string.
pub fn format_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_core::ErrorKind;

    #[test]
    fn test_operation_name_serialized_camel_case() {
        let payload = GraphQLRequest::new("query A { a } query B { b }").operation_name("B");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"query": "query A { a } query B { b }", "operationName": "B"}));
    }

    #[test]
    fn test_from_extensions() {
        let request = Request::post("")
            .with_extension("query", json!("query($id: ID!) { user(id: $id) { name } }"))
            .with_extension("variables", json!({"id": "1"}))
            .with_extension("operationName", json!("User"));

        let payload = GraphQLRequest::from_request(&request).unwrap();
        assert_eq!(payload.variables, Some(json!({"id": "1"})));
        assert_eq!(payload.operation_name.as_deref(), Some("User"));
    }

    #[test]
    fn test_from_body() {
        let request = Request::post("/graphql")
            .with_json(&json!({"query": "{ me { id } }", "operationName": "Me"}))
            .unwrap();
        let payload = GraphQLRequest::from_request(&request).unwrap();
        assert_eq!(payload.query, "{ me { id } }");
        assert_eq!(payload.operation_name.as_deref(), Some("Me"));
    }

    #[test]
    fn test_missing_query_is_validation_error() {
        let err = GraphQLRequest::from_request(&Request::post("/graphql")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let request = Request::post("").with_extension("query", json!("{ a }")).with_extension("variables", json!([1]));
        assert_eq!(
            GraphQLRequest::from_request(&request).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_error_display_and_path() {
        let response: GraphQLResponse = serde_json::from_value(json!({
            "data": null,
            "errors": [
                {"message": "not found", "path": ["user", 0, "name"], "locations": [{"line": 1, "column": 3}]},
                {"message": "denied"}
            ]
        }))
        .unwrap();

        assert!(response.has_errors());
        assert_eq!(
            response.error_message().unwrap(),
            "not found (path: user.[0].name) at 1:3; denied"
        );
    }
}
