//! Request and response envelopes exchanged with the coordinator.
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use worker_core::{
    AnalysisRequest, AnalysisStatus, ColumnType, EngineState, Perform, ResultStatus,
    SettingsUpdate,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown request type '{0}'")]
    UnknownRequest(String),
    #[error("request type '{0}' has no handler; add it to the dispatcher")]
    UnhandledRequest(EngineState),
}

impl EnvelopeError {
    /// Unknown or unhandled tags mean coordinator and worker disagree on the protocol.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EnvelopeError::Malformed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Analysis(AnalysisRequest),
    Filter(FilterRequest),
    RCode(CodeRequest),
    ComputeColumn(ComputeColumnRequest),
    ModuleRequest(ModuleRequest),
    Pause,
    Resume(SettingsUpdate),
    Stop,
    LogCfg(LogCfgRequest),
    Settings(SettingsUpdate),
}

impl Request {
    pub fn kind(&self) -> EngineState {
        match self {
            Request::Analysis(_) => EngineState::Analysis,
            Request::Filter(_) => EngineState::Filter,
            Request::RCode(_) => EngineState::RCode,
            Request::ComputeColumn(_) => EngineState::ComputeColumn,
            Request::ModuleRequest(_) => EngineState::ModuleRequest,
            Request::Pause => EngineState::PauseRequested,
            Request::Resume(_) => EngineState::Resuming,
            Request::Stop => EngineState::StopRequested,
            Request::LogCfg(_) => EngineState::LogCfg,
            Request::Settings(_) => EngineState::Settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub filter: String,
    #[serde(deserialize_with = "null_as_default")]
    pub generated_filter: String,
    #[serde(deserialize_with = "request_id")]
    pub request_id: i64,
}

impl Default for FilterRequest {
    fn default() -> Self {
        Self {
            filter: String::new(),
            generated_filter: String::new(),
            request_id: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeRequest {
    #[serde(rename = "rCode", deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "request_id")]
    pub request_id: i64,
    #[serde(deserialize_with = "white_listed")]
    pub white_listed: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub return_log: bool,
}

impl Default for CodeRequest {
    fn default() -> Self {
        Self {
            code: String::new(),
            request_id: -1,
            white_listed: true,
            return_log: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ComputeColumnFields {
    #[serde(deserialize_with = "null_as_default")]
    column_name: String,
    #[serde(deserialize_with = "null_as_default")]
    compute_code: String,
    #[serde(deserialize_with = "null_as_default")]
    column_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeColumnRequest {
    pub column_name: String,
    pub compute_code: String,
    /// `Err` holds the unrecognised type name.
    pub column_type: Result<ColumnType, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleRequest {
    #[serde(rename = "moduleRequest", deserialize_with = "null_as_default")]
    pub request: String,
    #[serde(rename = "moduleCode", deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(rename = "moduleName", deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct LogCfgRequest {
    #[serde(rename = "where")]
    pub target: Option<String>,
    pub log_path: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnalysisFields {
    #[serde(deserialize_with = "integral")]
    id: Option<i64>,
    perform: Option<String>,
    name: Option<String>,
    title: Option<String>,
    data_key: Value,
    results_meta: Value,
    state_key: Value,
    #[serde(deserialize_with = "integral")]
    revision: Option<i64>,
    image: Value,
    #[serde(deserialize_with = "null_as_default")]
    rfile: String,
    #[serde(deserialize_with = "null_as_default")]
    dynamic_module_call: String,
    #[serde(deserialize_with = "flag")]
    requires_init: Option<bool>,
    #[serde(deserialize_with = "lenient_flag")]
    jasp_results: bool,
    options: Value,
}

impl Default for AnalysisFields {
    fn default() -> Self {
        Self {
            id: None,
            perform: None,
            name: None,
            title: None,
            data_key: Value::Null,
            results_meta: Value::Null,
            state_key: Value::Null,
            revision: None,
            image: Value::Null,
            rfile: String::new(),
            dynamic_module_call: String::new(),
            requires_init: None,
            jasp_results: false,
            options: Value::Null,
        }
    }
}

impl From<AnalysisFields> for AnalysisRequest {
    fn from(fields: AnalysisFields) -> Self {
        AnalysisRequest {
            id: fields.id.unwrap_or(-1),
            perform: Perform::from_name(fields.perform.as_deref().unwrap_or("run")),
            name: fields.name.unwrap_or_default(),
            title: fields.title.unwrap_or_default(),
            data_key: fields.data_key,
            results_meta: fields.results_meta,
            state_key: fields.state_key,
            revision: fields.revision.unwrap_or(-1),
            image: fields.image,
            rfile: fields.rfile,
            dynamic_module_call: fields.dynamic_module_call,
            requires_init: fields.requires_init.unwrap_or(true),
            jasp_results: fields.jasp_results,
            options: fields.options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct SettingsFields {
    #[serde(deserialize_with = "integral")]
    ppi: Option<u32>,
    #[serde(deserialize_with = "flag")]
    developer_mode: Option<bool>,
    image_background: Option<String>,
    language_code: Option<String>,
}

impl From<SettingsFields> for SettingsUpdate {
    fn from(fields: SettingsFields) -> Self {
        SettingsUpdate {
            ppi: fields.ppi,
            developer_mode: fields.developer_mode,
            image_background: fields.image_background,
            language_code: fields.language_code,
        }
    }
}

/// Treats an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An integer that may arrive as an integral float; `null` reads as absent.
pub(crate) fn integral<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let number = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number,
        Some(other) => return Err(D::Error::custom(format!("expected an integer, found {other}"))),
    };
    number
        .as_i64()
        .or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        })
        .and_then(|n| T::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("{number} is not a usable integer")))
}

/// A boolean that may arrive as a number; `null` reads as absent.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(flag)),
        Some(Value::Number(number)) => Ok(Some(number.as_f64().is_some_and(|n| n != 0.0))),
        Some(other) => Err(D::Error::custom(format!("expected a boolean, found {other}"))),
    }
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(flag(deserializer)?.unwrap_or(false))
}

fn white_listed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(flag(deserializer)?.unwrap_or(true))
}

fn request_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(integral(deserializer)?.unwrap_or(-1))
}

fn fields<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, EnvelopeError> {
    serde_json::from_value(value).map_err(|err| EnvelopeError::Malformed(err.to_string()))
}

/// Decodes one raw message.
///
/// Empty messages and messages without a `typeRequest` yield `Ok(None)`.
pub fn decode(raw: &str) -> Result<Option<Request>, EnvelopeError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|err| EnvelopeError::Malformed(err.to_string()))?;
    let tag = match value.get("typeRequest").and_then(Value::as_str) {
        Some(tag) if !tag.is_empty() => tag.to_string(),
        _ => return Ok(None),
    };
    let kind =
        EngineState::from_name(&tag).ok_or_else(|| EnvelopeError::UnknownRequest(tag.clone()))?;

    let request = match kind {
        EngineState::Analysis => Request::Analysis(fields::<AnalysisFields>(value)?.into()),
        EngineState::Filter => Request::Filter(fields(value)?),
        EngineState::RCode => Request::RCode(fields(value)?),
        EngineState::ComputeColumn => {
            let raw: ComputeColumnFields = fields(value)?;
            Request::ComputeColumn(ComputeColumnRequest {
                column_type: ColumnType::from_name(&raw.column_type).ok_or(raw.column_type),
                column_name: raw.column_name,
                compute_code: raw.compute_code,
            })
        }
        EngineState::ModuleRequest => Request::ModuleRequest(fields(value)?),
        EngineState::PauseRequested => Request::Pause,
        EngineState::Resuming => Request::Resume(fields::<SettingsFields>(value)?.into()),
        EngineState::StopRequested => Request::Stop,
        EngineState::LogCfg => Request::LogCfg(fields(value)?),
        EngineState::Settings => Request::Settings(fields::<SettingsFields>(value)?.into()),
        other => return Err(EnvelopeError::UnhandledRequest(other)),
    };
    Ok(Some(request))
}

/// Acknowledgement carrying only the tag.
pub fn acknowledgement(state: EngineState) -> Value {
    json!({ "typeRequest": state.as_str() })
}

pub fn filter_result(request_id: i64, rows: &[bool], warning: Option<&str>) -> Value {
    let mut response = json!({
        "typeRequest": EngineState::Filter.as_str(),
        "filterResult": rows,
        "requestId": request_id,
    });
    if let Some(warning) = warning.filter(|w| !w.is_empty()) {
        response["filterError"] = json!(warning);
    }
    response
}

pub fn filter_error(request_id: i64, message: &str) -> Value {
    json!({
        "typeRequest": EngineState::Filter.as_str(),
        "filterError": message,
        "requestId": request_id,
    })
}

pub fn code_result(request_id: i64, result: &str, error: Option<&str>) -> Value {
    let mut response = json!({
        "typeRequest": EngineState::RCode.as_str(),
        "rCodeResult": result,
        "requestId": request_id,
    });
    if let Some(error) = error.filter(|e| !e.is_empty()) {
        response["rCodeError"] = json!(error);
    }
    response
}

pub fn code_error(request_id: i64, error: &str) -> Value {
    json!({
        "typeRequest": EngineState::RCode.as_str(),
        "rCodeError": error,
        "requestId": request_id,
    })
}

pub fn compute_column_result(column_name: &str, result: &str, error: &str) -> Value {
    json!({
        "typeRequest": EngineState::ComputeColumn.as_str(),
        "result": result,
        "error": error,
        "columnName": column_name,
    })
}

pub fn module_result(request: &ModuleRequest, success: bool, error: &str) -> Value {
    json!({
        "typeRequest": EngineState::ModuleRequest.as_str(),
        "moduleRequest": request.request,
        "moduleName": request.name,
        "succes": success,
        "error": error,
    })
}

/// Identity of the analysis a response belongs to.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisHeader<'a> {
    pub id: i64,
    pub name: &'a str,
    pub revision: i64,
    pub progress: i32,
    pub status: AnalysisStatus,
}

/// Wraps a runtime payload into an analysis response.
///
/// A recognised `status` in the payload wins over the one derived from the slot.
pub fn analysis_response(header: AnalysisHeader<'_>, payload: &Value) -> Value {
    let own_status = payload
        .get("status")
        .and_then(Value::as_str)
        .and_then(ResultStatus::from_name);
    let status = own_status.unwrap_or_else(|| header.status.result_status());
    let results = payload.get("results").unwrap_or(payload);

    json!({
        "typeRequest": EngineState::Analysis.as_str(),
        "id": header.id,
        "name": header.name,
        "revision": header.revision,
        "progress": header.progress,
        "results": results,
        "status": status.as_str(),
    })
}
