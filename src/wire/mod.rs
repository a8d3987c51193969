//! JSON wire format for graphs.
//!
//! Documents look like `{"format": "invariant-graph", "version": 1,
//! "graph": {…}}`. Single-key objects whose key is a reserved `$`-prefixed
//! name are markers (`$ref`, `$cel`, `$decimal`, `$tuple`, `$icacheable`,
//! `$literal`); every other object is a plain map. The deserializer hands
//! the engine typed vertices; the serializer emits sorted keys and sorted
//! dependency lists so equal graphs serialize byte-equal.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as Json};

use crate::error::EngineError;
use crate::graph::{Graph, Param, ParamMap, Vertex};
use crate::store::{TypeRegistry, codec};
use crate::value::Value;

pub const FORMAT: &str = "invariant-graph";
pub const VERSION: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    format: String,
    version: u64,
    graph: JsonMap<String, Json>,
}

/// Parses a wire document into a graph. The type registry resolves
/// `$icacheable` Domain literals.
pub fn parse(json: &str, types: &TypeRegistry) -> Result<Graph, EngineError> {
    let document: Document = serde_json::from_str(json)
        .map_err(|e| EngineError::validation(format!("invalid graph document: {e}"), None))?;
    if document.format != FORMAT {
        return Err(EngineError::validation(
            format!("unsupported document format '{}'", document.format),
            None,
        ));
    }
    if document.version != VERSION {
        return Err(EngineError::validation(
            format!("unsupported document version {}", document.version),
            None,
        ));
    }
    parse_graph(&document.graph, types)
}

fn parse_graph(entries: &JsonMap<String, Json>, types: &TypeRegistry) -> Result<Graph, EngineError> {
    let mut graph = Graph::new();
    for (name, json) in entries {
        let vertex = parse_vertex(name, json, types)?;
        graph.insert(name.clone(), vertex);
    }
    Ok(graph)
}

fn parse_vertex(name: &str, json: &Json, types: &TypeRegistry) -> Result<Vertex, EngineError> {
    let obj = json
        .as_object()
        .ok_or_else(|| invalid(name, "vertex must be an object"))?;
    let kind = obj
        .get("kind")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid(name, "vertex is missing string field 'kind'"))?;

    let params = match obj.get("params") {
        Some(json) => parse_param_map(name, json, types)?,
        None => ParamMap::new(),
    };
    let deps = parse_deps(name, obj.get("deps"))?;

    match kind {
        "node" => {
            let op_name = obj
                .get("op_name")
                .and_then(Json::as_str)
                .ok_or_else(|| invalid(name, "op vertex is missing string field 'op_name'"))?;
            let cache = match obj.get("cache") {
                Some(json) => json
                    .as_bool()
                    .ok_or_else(|| invalid(name, "'cache' must be a boolean"))?,
                None => true,
            };
            Vertex::op_with_cache(op_name, params, deps, cache).map_err(|e| name_vertex(e, name))
        }
        "subgraph" => {
            let inner = obj
                .get("graph")
                .and_then(Json::as_object)
                .ok_or_else(|| invalid(name, "sub-graph vertex is missing object field 'graph'"))?;
            let output = obj
                .get("output")
                .and_then(Json::as_str)
                .ok_or_else(|| invalid(name, "sub-graph vertex is missing string field 'output'"))?;
            let inner = parse_graph(inner, types)?;
            Vertex::subgraph(params, deps, inner, output).map_err(|e| name_vertex(e, name))
        }
        other => Err(invalid(name, format!("unknown vertex kind '{other}'"))),
    }
}

fn parse_deps(name: &str, json: Option<&Json>) -> Result<Vec<String>, EngineError> {
    let Some(json) = json else {
        return Ok(Vec::new());
    };
    let items = json
        .as_array()
        .ok_or_else(|| invalid(name, "'deps' must be an array of strings"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(String::from)
                .ok_or_else(|| invalid(name, "'deps' must be an array of strings"))
        })
        .collect()
}

fn parse_param_map(
    vertex: &str,
    json: &Json,
    types: &TypeRegistry,
) -> Result<ParamMap, EngineError> {
    let obj = json
        .as_object()
        .ok_or_else(|| invalid(vertex, "'params' must be an object"))?;
    let mut params = ParamMap::new();
    for (key, value) in obj {
        params.insert(key.clone(), parse_param(vertex, value, types)?);
    }
    Ok(params)
}

fn parse_param(vertex: &str, json: &Json, types: &TypeRegistry) -> Result<Param, EngineError> {
    match json {
        Json::Null => Ok(Param::Lit(Value::Null)),
        Json::Bool(b) => Ok(Param::Lit(Value::Bool(*b))),
        Json::Number(n) => Ok(Param::Lit(parse_int(vertex, n)?)),
        Json::String(s) => Ok(Param::str(s)),
        Json::Array(items) => {
            let items = items
                .iter()
                .map(|item| parse_param(vertex, item, types))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Param::List(items))
        }
        Json::Object(obj) => parse_param_object(vertex, obj, types),
    }
}

fn parse_param_object(
    vertex: &str,
    obj: &JsonMap<String, Json>,
    types: &TypeRegistry,
) -> Result<Param, EngineError> {
    if obj.len() == 1 {
        let (key, value) = obj.iter().next().expect("single entry");
        match key.as_str() {
            "$ref" => {
                let dep = value
                    .as_str()
                    .ok_or_else(|| invalid(vertex, "$ref must carry a string"))?;
                return Ok(Param::reference(dep));
            }
            "$cel" => {
                let source = value
                    .as_str()
                    .ok_or_else(|| invalid(vertex, "$cel must carry a string"))?;
                return Ok(Param::cel(source));
            }
            "$decimal" => {
                let text = value
                    .as_str()
                    .ok_or_else(|| invalid(vertex, "$decimal must carry a string"))?;
                let value = Value::decimal_str(text).map_err(|e| invalid(vertex, e))?;
                return Ok(Param::Lit(value));
            }
            "$tuple" => {
                let items = value
                    .as_array()
                    .ok_or_else(|| invalid(vertex, "$tuple must carry an array"))?;
                let items = items
                    .iter()
                    .map(|item| parse_param(vertex, item, types))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Param::List(items));
            }
            "$literal" => {
                // Inhibits marker interpretation for the whole subtree.
                return Ok(Param::Lit(json_to_value(vertex, value)?));
            }
            "$icacheable" => {
                return Ok(Param::Lit(parse_domain_literal(vertex, value, types)?));
            }
            other if other.starts_with('$') => {
                return Err(invalid(vertex, format!("unknown marker '{other}'")));
            }
            _ => {}
        }
    }
    let mut entries = BTreeMap::new();
    for (key, value) in obj {
        entries.insert(key.clone(), parse_param(vertex, value, types)?);
    }
    Ok(Param::Map(entries))
}

fn parse_domain_literal(
    vertex: &str,
    json: &Json,
    types: &TypeRegistry,
) -> Result<Value, EngineError> {
    let obj = json
        .as_object()
        .ok_or_else(|| invalid(vertex, "$icacheable must carry an object"))?;
    let type_name = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid(vertex, "$icacheable is missing string field 'type'"))?;

    if let Some(payload) = obj.get("payload_b64") {
        let payload = payload
            .as_str()
            .ok_or_else(|| invalid(vertex, "'payload_b64' must be a string"))?;
        let bytes = base64::decode(payload)
            .map_err(|e| invalid(vertex, format!("invalid base64 payload: {e}")))?;
        let deserialize = types.get(type_name).ok_or_else(|| {
            invalid(vertex, format!("no deserializer for artifact type '{type_name}'"))
        })?;
        let artifact = deserialize(&bytes).map_err(|e| invalid(vertex, e.to_string()))?;
        return Ok(Value::Domain(artifact));
    }

    // Native-typed payloads carry the value inline under the reserved
    // envelope type names.
    if let Some(value) = obj.get("value") {
        let value = json_to_value(vertex, value)?;
        let expected = match type_name {
            codec::TYPE_NULL => "Null",
            codec::TYPE_BOOL => "Bool",
            codec::TYPE_INT => "Int",
            codec::TYPE_DECIMAL => "Decimal",
            codec::TYPE_STR => "Str",
            codec::TYPE_LIST => "List",
            codec::TYPE_MAP => "Map",
            other => {
                return Err(invalid(
                    vertex,
                    format!("inline 'value' requires a native type, got '{other}'"),
                ));
            }
        };
        if value.kind() != expected {
            return Err(invalid(
                vertex,
                format!("payload of type '{type_name}' is a {}", value.kind()),
            ));
        }
        return Ok(value);
    }

    Err(invalid(
        vertex,
        "$icacheable needs either 'payload_b64' or 'value'",
    ))
}

/// Plain JSON → Value, with no marker interpretation. Fractional numbers
/// are rejected; there are no floats in the value universe.
fn json_to_value(vertex: &str, json: &Json) -> Result<Value, EngineError> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => parse_int(vertex, n),
        Json::String(s) => Ok(Value::str(s)),
        Json::Array(items) => {
            let items = items
                .iter()
                .map(|item| json_to_value(vertex, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(items))
        }
        Json::Object(obj) => {
            let mut entries = BTreeMap::new();
            for (key, value) in obj {
                entries.insert(key.clone(), json_to_value(vertex, value)?);
            }
            Ok(Value::Map(entries))
        }
    }
}

fn parse_int(vertex: &str, n: &serde_json::Number) -> Result<Value, EngineError> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::int(i));
    }
    let text = n.to_string();
    if text.contains(['.', 'e', 'E']) {
        return Err(invalid(
            vertex,
            format!("number {text} is not an integer; use $decimal for exact decimals"),
        ));
    }
    let parsed = text
        .parse()
        .map_err(|_| invalid(vertex, format!("invalid integer literal {text}")))?;
    Ok(Value::Int(parsed))
}

fn invalid(vertex: &str, message: impl Into<String>) -> EngineError {
    EngineError::validation(message, Some(vertex.to_string()))
}

fn name_vertex(err: EngineError, name: &str) -> EngineError {
    match err {
        EngineError::Validation {
            vertex: None,
            message,
        } => EngineError::validation(message, Some(name.to_string())),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serializes a graph into a wire document. Map keys and dependency lists
/// come out sorted, so equal graphs serialize identically.
pub fn serialize(graph: &Graph) -> Json {
    let document = Document {
        format: FORMAT.to_string(),
        version: VERSION,
        graph: serialize_graph(graph),
    };
    serde_json::to_value(document).expect("document serializes")
}

fn serialize_graph(graph: &Graph) -> JsonMap<String, Json> {
    let mut entries = JsonMap::new();
    for (name, vertex) in graph {
        entries.insert(name.clone(), serialize_vertex(vertex));
    }
    entries
}

fn serialize_vertex(vertex: &Vertex) -> Json {
    let mut obj = JsonMap::new();
    match vertex {
        Vertex::Op(op) => {
            obj.insert("kind".to_string(), Json::from("node"));
            obj.insert("op_name".to_string(), Json::from(op.op_name.clone()));
            obj.insert("params".to_string(), serialize_params(&op.params));
            obj.insert("deps".to_string(), serialize_deps(&op.deps));
            if !op.cache {
                obj.insert("cache".to_string(), Json::from(false));
            }
        }
        Vertex::SubGraph(sub) => {
            obj.insert("kind".to_string(), Json::from("subgraph"));
            obj.insert("params".to_string(), serialize_params(&sub.params));
            obj.insert("deps".to_string(), serialize_deps(&sub.deps));
            obj.insert("graph".to_string(), Json::Object(serialize_graph(&sub.graph)));
            obj.insert("output".to_string(), Json::from(sub.output.clone()));
        }
    }
    Json::Object(obj)
}

fn serialize_deps(deps: &[String]) -> Json {
    let mut sorted: Vec<String> = deps.to_vec();
    sorted.sort();
    Json::from(sorted)
}

fn serialize_params(params: &ParamMap) -> Json {
    let mut obj = JsonMap::new();
    for (key, param) in params {
        obj.insert(key.clone(), serialize_param(param));
    }
    Json::Object(obj)
}

fn serialize_param(param: &Param) -> Json {
    match param {
        Param::Str(s) => Json::from(s.clone()),
        Param::Ref(dep) => single("$ref", Json::from(dep.clone())),
        Param::Cel(source) => single("$cel", Json::from(source.clone())),
        Param::List(items) => Json::Array(items.iter().map(serialize_param).collect()),
        Param::Map(entries) => {
            let mut obj = JsonMap::new();
            for (key, value) in entries {
                obj.insert(key.clone(), serialize_param(value));
            }
            Json::Object(obj)
        }
        Param::Lit(value) => serialize_literal(value),
    }
}

fn serialize_literal(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::from(*b),
        Value::Int(n) => {
            Json::Number(serde_json::Number::from_str(&n.to_string()).expect("integer literal"))
        }
        Value::Decimal(d) => single("$decimal", Json::from(Value::decimal_canonical(d))),
        // Str, List, and Map literals ride the $literal escape so they stay
        // inert through a round-trip.
        Value::Str(_) | Value::List(_) | Value::Map(_) => {
            single("$literal", value_to_json(value))
        }
        Value::Domain(artifact) => {
            let mut obj = JsonMap::new();
            obj.insert("type".to_string(), Json::from(artifact.type_name()));
            obj.insert(
                "payload_b64".to_string(),
                Json::from(base64::encode(artifact.to_stream())),
            );
            single("$icacheable", Json::Object(obj))
        }
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::from(*b),
        Value::Int(n) => {
            Json::Number(serde_json::Number::from_str(&n.to_string()).expect("integer literal"))
        }
        Value::Decimal(d) => Json::from(Value::decimal_canonical(d)),
        Value::Str(s) => Json::from(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => {
            let mut obj = JsonMap::new();
            for (key, val) in entries {
                obj.insert(key.clone(), value_to_json(val));
            }
            Json::Object(obj)
        }
        Value::Domain(artifact) => {
            let mut obj = JsonMap::new();
            obj.insert("type".to_string(), Json::from(artifact.type_name()));
            obj.insert(
                "payload_b64".to_string(),
                Json::from(base64::encode(artifact.to_stream())),
            );
            Json::Object(obj)
        }
    }
}

fn single(key: &str, value: Json) -> Json {
    let mut obj = JsonMap::new();
    obj.insert(key.to_string(), value);
    Json::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(json: &str) -> Result<Graph, EngineError> {
        parse(json, &TypeRegistry::new())
    }

    #[test]
    fn rejects_wrong_format_and_version() {
        let err = parse_str(r#"{"format": "other", "version": 1, "graph": {}}"#).unwrap_err();
        assert!(err.to_string().contains("format"), "got: {err}");
        let err = parse_str(r#"{"format": "invariant-graph", "version": 2, "graph": {}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("version"), "got: {err}");
    }

    #[test]
    fn parses_markers() {
        let graph = parse_str(
            r#"{
                "format": "invariant-graph",
                "version": 1,
                "graph": {
                    "v": {
                        "kind": "node",
                        "op_name": "core:identity",
                        "params": {
                            "value": {"$ref": "x"},
                            "expr": {"$cel": "x + 1"},
                            "exact": {"$decimal": "2.50"},
                            "pair": {"$tuple": [1, 2]},
                            "escaped": {"$literal": {"$ref": "not-a-marker"}}
                        },
                        "deps": ["x"]
                    }
                }
            }"#,
        )
        .unwrap();

        let Vertex::Op(op) = &graph["v"] else {
            panic!("expected op vertex");
        };
        assert_eq!(op.params["value"], Param::reference("x"));
        assert_eq!(op.params["expr"], Param::cel("x + 1"));
        assert_eq!(
            op.params["exact"],
            Param::Lit(Value::decimal_str("2.5").unwrap())
        );
        assert_eq!(
            op.params["pair"],
            Param::List(vec![Param::int(1), Param::int(2)])
        );
        let mut escaped = BTreeMap::new();
        escaped.insert("$ref".to_string(), Value::str("not-a-marker"));
        assert_eq!(op.params["escaped"], Param::Lit(Value::Map(escaped)));
    }

    #[test]
    fn multi_key_objects_are_plain_maps() {
        let graph = parse_str(
            r#"{
                "format": "invariant-graph",
                "version": 1,
                "graph": {
                    "v": {
                        "kind": "node",
                        "op_name": "core:identity",
                        "params": {"value": {"$ref": "x", "other": 1}},
                        "deps": ["x"]
                    }
                }
            }"#,
        )
        .unwrap();
        let Vertex::Op(op) = &graph["v"] else {
            panic!("expected op vertex");
        };
        assert!(matches!(op.params["value"], Param::Map(_)));
    }

    #[test]
    fn fractional_numbers_are_rejected() {
        let err = parse_str(
            r#"{
                "format": "invariant-graph",
                "version": 1,
                "graph": {
                    "v": {
                        "kind": "node",
                        "op_name": "core:identity",
                        "params": {"value": 1.5},
                        "deps": []
                    }
                }
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("$decimal"), "got: {err}");
    }

    #[test]
    fn unknown_marker_is_rejected() {
        let err = parse_str(
            r#"{
                "format": "invariant-graph",
                "version": 1,
                "graph": {
                    "v": {
                        "kind": "node",
                        "op_name": "core:identity",
                        "params": {"value": {"$frob": 1}},
                        "deps": []
                    }
                }
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("$frob"), "got: {err}");
    }

    #[test]
    fn big_integers_survive() {
        let graph = parse_str(
            r#"{
                "format": "invariant-graph",
                "version": 1,
                "graph": {
                    "v": {
                        "kind": "node",
                        "op_name": "core:identity",
                        "params": {"value": 340282366920938463463374607431768211456},
                        "deps": []
                    }
                }
            }"#,
        )
        .unwrap();
        let Vertex::Op(op) = &graph["v"] else {
            panic!("expected op vertex");
        };
        assert_eq!(
            op.params["value"],
            Param::Lit(Value::Int(
                "340282366920938463463374607431768211456".parse().unwrap()
            ))
        );
    }

    #[test]
    fn round_trips_through_serialize() {
        let source = r#"{
            "format": "invariant-graph",
            "version": 1,
            "graph": {
                "sum": {
                    "kind": "node",
                    "op_name": "core:add",
                    "params": {"a": {"$ref": "x"}, "b": {"$cel": "x * 2"}},
                    "deps": ["x"]
                },
                "x": {
                    "kind": "node",
                    "op_name": "core:identity",
                    "params": {"value": 5},
                    "deps": []
                }
            }
        }"#;
        let graph = parse_str(source).unwrap();
        let json = serialize(&graph);
        let graph2 = parse(&json.to_string(), &TypeRegistry::new()).unwrap();
        assert_eq!(serialize(&graph2), json);
    }

    #[test]
    fn serialization_is_deterministic() {
        let mut params = ParamMap::new();
        params.insert("value".to_string(), Param::int(5));
        let mut graph = Graph::new();
        graph.insert(
            "v".to_string(),
            Vertex::op_with_cache("core:identity", params, vec![], false).unwrap(),
        );
        let compact = serialize(&graph).to_string();
        insta::assert_snapshot!(
            compact,
            @r#"{"format":"invariant-graph","graph":{"v":{"cache":false,"deps":[],"kind":"node","op_name":"core:identity","params":{"value":5}}},"version":1}"#
        );
    }
}
