//! Centralized string constants shared across the ingestor and executor.

// Content Types
pub const CONTENT_TYPE_IDENTIFIER_JSON: &str = "json";
pub const CONTENT_TYPE_IDENTIFIER_MULTIPART: &str = "multipart";
pub const CONTENT_TYPE_IDENTIFIER_URLENCODED: &str = "urlencoded";

// OpenAPI field names that are boolean in 3.0 but sometimes rendered as 0/1
// by specs authored against looser JSON Schema dialects.
pub const FIELD_DEPRECATED: &str = "deprecated";
pub const FIELD_REQUIRED: &str = "required";
pub const FIELD_READ_ONLY: &str = "readOnly";
pub const FIELD_WRITE_ONLY: &str = "writeOnly";
pub const FIELD_NULLABLE: &str = "nullable";
pub const FIELD_UNIQUE_ITEMS: &str = "uniqueItems";
pub const FIELD_ALLOW_EMPTY_VALUE: &str = "allowEmptyValue";
pub const FIELD_EXPLODE: &str = "explode";
pub const FIELD_ALLOW_RESERVED: &str = "allowReserved";
pub const FIELD_EXCLUSIVE_MINIMUM: &str = "exclusiveMinimum";
pub const FIELD_EXCLUSIVE_MAXIMUM: &str = "exclusiveMaximum";

// OpenAPI component section names, used to detect malformed 3.1 indentation.
pub const COMPONENT_SCHEMAS: &str = "schemas";
pub const COMPONENT_RESPONSES: &str = "responses";
pub const COMPONENT_EXAMPLES: &str = "examples";
pub const COMPONENT_PARAMETERS: &str = "parameters";
pub const COMPONENT_REQUEST_BODIES: &str = "requestBodies";
pub const COMPONENT_HEADERS: &str = "headers";
pub const COMPONENT_SECURITY_SCHEMES: &str = "securitySchemes";
pub const COMPONENT_LINKS: &str = "links";
pub const COMPONENT_CALLBACKS: &str = "callbacks";

// Security scheme shapes that require a synthesized Authorization variable.
pub const SECURITY_TYPE_HTTP: &str = "http";
pub const SECURITY_SCHEME_BEARER: &str = "bearer";

pub const MSG_WARNING_PREFIX: &str = "Warning:";

// Non-operation keys that appear as siblings of HTTP methods under a path item.
pub const PATH_ITEM_NON_OPERATION_KEYS: &[&str] =
    &["parameters", "servers", "summary", "description", "$ref"];

/// Tokens treated as producer-response lifecycle endpoints — candidates whose
/// source path contains one of these are capped at confidence 0.5 (C5 rule 4).
pub const LIFECYCLE_PATH_TOKENS: &[&str] = &["history", "status", "balance", "cancel", "pay"];

/// Response-body field names consulted by the auth-chain rule (C4), in
/// preference order.
pub const TOKEN_FIELD_CANDIDATES: &[&str] =
    &["accessToken", "access_token", "refreshToken", "refresh_token"];
