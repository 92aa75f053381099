use serde_json::Value;

use crate::Perform;

pub type AnalysisId = i64;

/// Fields of one decoded `analysis` message.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub id: AnalysisId,
    /// `None` when the message carried a `perform` value we do not know.
    pub perform: Option<Perform>,
    pub name: String,
    pub title: String,
    pub data_key: Value,
    pub results_meta: Value,
    pub state_key: Value,
    pub revision: i64,
    pub image: Value,
    pub rfile: String,
    pub dynamic_module_call: String,
    pub requires_init: bool,
    pub jasp_results: bool,
    pub options: Value,
}

impl AnalysisRequest {
    /// A request with neutral defaults, as if only `id` and `perform` were sent.
    pub fn new(id: AnalysisId, perform: Option<Perform>) -> Self {
        Self {
            id,
            perform,
            name: String::new(),
            title: String::new(),
            data_key: Value::Null,
            results_meta: Value::Null,
            state_key: Value::Null,
            revision: -1,
            image: Value::Null,
            rfile: String::new(),
            dynamic_module_call: String::new(),
            requires_init: true,
            jasp_results: false,
            options: Value::Null,
        }
    }
}

/// Immutable snapshot of the request currently targeted by the analysis slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAnalysis {
    pub id: AnalysisId,
    pub name: String,
    pub title: String,
    pub data_key: Value,
    pub results_meta: Value,
    pub state_key: Value,
    pub revision: i64,
    pub image: Value,
    pub rfile: String,
    pub dynamic_module_call: Option<String>,
    pub requires_init: bool,
    pub options: Value,
    pub developer_mode: bool,
    pub(crate) rich_results: bool,
}

impl PendingAnalysis {
    pub fn capture(request: AnalysisRequest, developer_mode: bool) -> Self {
        let dynamic_module_call =
            Some(request.dynamic_module_call).filter(|call| !call.is_empty());
        let rich_results = dynamic_module_call.is_some() || request.jasp_results;
        Self {
            id: request.id,
            name: request.name,
            title: request.title,
            data_key: request.data_key,
            results_meta: request.results_meta,
            state_key: request.state_key,
            revision: request.revision,
            image: request.image,
            rfile: request.rfile,
            dynamic_module_call,
            requires_init: request.requires_init,
            options: request.options,
            developer_mode,
            rich_results,
        }
    }

    /// Results stream through the callback instead of the return value.
    pub fn rich_results(&self) -> bool {
        self.rich_results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_module_call_implies_rich_results() {
        let mut request = AnalysisRequest::new(1, Some(Perform::Run));
        request.dynamic_module_call = "jaspDescriptives::descriptives".into();
        let pending = PendingAnalysis::capture(request, false);
        assert!(pending.rich_results());
        assert_eq!(
            pending.dynamic_module_call.as_deref(),
            Some("jaspDescriptives::descriptives")
        );
    }

    #[test]
    fn classic_request_without_flag_is_not_rich() {
        let pending = PendingAnalysis::capture(AnalysisRequest::new(1, Some(Perform::Run)), true);
        assert!(!pending.rich_results());
        assert!(pending.dynamic_module_call.is_none());
        assert!(pending.developer_mode);
    }
}
