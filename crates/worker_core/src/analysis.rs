//! Per-analysis lifecycle: which request owns the slot, and what the
//! engine should do before, during and after a runtime call.
use serde_json::Value;

use crate::{AnalysisId, AnalysisRequest, AnalysisStatus, PendingAnalysis, Perform};

/// Answer handed back to a runtime blocked inside an analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Ok,
    /// Options changed; incorporate them or return a null payload.
    Changed { options: Value },
    /// Stop at once and return.
    Aborted,
}

/// What the loop should do with the slot on its next iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStep {
    /// Nothing to run; the slot has been reset.
    Idle,
    SaveImage,
    EditImage,
    RewriteImages,
    /// Call the runtime with `perform` (`Init` or `Run`).
    Invoke { perform: Perform, rich_results: bool },
}

/// What the callback should emit before answering the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    None,
    /// Forward the supplied payload as an intermediate result.
    Results,
    /// No payload, only a progress update.
    ProgressOnly,
}

/// Outcome of one callback checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub emission: Emission,
    pub directive: Directive,
}

/// What to do once the runtime call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another request took the slot while running; stay in `analysis`.
    Superseded,
    /// The run was aborted or failed; the slot is free again.
    Dropped,
    /// The change was not incorporated; run again from `toInit`.
    Restart { discard_temp_files: bool },
    /// Parse the payload. `send` tells whether it still has to be emitted.
    Deliver { send: bool },
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisSlot {
    id: Option<AnalysisId>,
    status: AnalysisStatus,
    pending: Option<PendingAnalysis>,
    knows_about_change: bool,
    progress: i32,
}

impl AnalysisSlot {
    pub fn new() -> Self {
        Self {
            progress: -1,
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<AnalysisId> {
        self.id
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn pending(&self) -> Option<&PendingAnalysis> {
        self.pending.as_ref()
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn knows_about_change(&self) -> bool {
        self.knows_about_change
    }

    pub fn rich_results(&self) -> bool {
        self.pending.as_ref().is_some_and(PendingAnalysis::rich_results)
    }

    /// The slot holds an active or pending analysis.
    pub fn is_occupied(&self) -> bool {
        self.status.is_active() || self.status.is_pending()
    }

    /// Folds a new request into the slot and returns the resulting status.
    pub fn receive(&mut self, request: AnalysisRequest, developer_mode: bool) -> AnalysisStatus {
        if Some(request.id) == self.id && self.status == AnalysisStatus::Running {
            let incorporate = match request.perform {
                Some(Perform::Init) => true,
                Some(Perform::Run) => self.rich_results(),
                _ => false,
            };
            self.status = if incorporate {
                AnalysisStatus::Changed
            } else {
                AnalysisStatus::Aborted
            };
        } else {
            self.id = Some(request.id);
            self.status = match request.perform {
                Some(Perform::Init) => AnalysisStatus::ToInit,
                Some(Perform::Run) => AnalysisStatus::ToRun,
                Some(Perform::SaveImg) => AnalysisStatus::SaveImg,
                Some(Perform::EditImg) => AnalysisStatus::EditImg,
                Some(Perform::RewriteImgs) => AnalysisStatus::RewriteImgs,
                None => AnalysisStatus::Error,
            };
        }

        if self.status.captures_request() {
            let mut pending = PendingAnalysis::capture(request, developer_mode);
            if self.status == AnalysisStatus::Changed {
                // The protocol is fixed for the lifetime of one analysis.
                pending.rich_results = self.rich_results();
            }
            self.pending = Some(pending);
        }
        self.status
    }

    /// Marks whatever the slot holds as aborted (pause/stop).
    pub fn abort(&mut self) {
        self.status = AnalysisStatus::Aborted;
    }

    /// Decides the next step and moves the status into its active form.
    pub fn begin_run(&mut self) -> RunStep {
        match self.status {
            AnalysisStatus::SaveImg => return RunStep::SaveImage,
            AnalysisStatus::EditImg => return RunStep::EditImage,
            AnalysisStatus::RewriteImgs => return RunStep::RewriteImages,
            AnalysisStatus::ToInit | AnalysisStatus::ToRun | AnalysisStatus::Changed => {}
            _ => {
                self.status = AnalysisStatus::Empty;
                return RunStep::Idle;
            }
        }

        let rich_results = self.rich_results();
        let perform = if self.status == AnalysisStatus::ToInit && !rich_results {
            self.status = AnalysisStatus::Initing;
            Perform::Init
        } else {
            self.status = AnalysisStatus::Running;
            Perform::Run
        };
        self.knows_about_change = false;
        RunStep::Invoke {
            perform,
            rich_results,
        }
    }

    /// Called from the runtime callback after the reentrant poll.
    pub fn checkpoint(&mut self, has_payload: bool, progress: i32) -> Checkpoint {
        if !self.status.owns_running_call() {
            return Checkpoint {
                emission: Emission::None,
                directive: Directive::Aborted,
            };
        }

        if self.status == AnalysisStatus::Changed && self.knows_about_change {
            self.status = AnalysisStatus::Running;
            self.knows_about_change = false;
        }

        let emission = if has_payload {
            Emission::Results
        } else if progress >= 0 && self.status == AnalysisStatus::Running {
            Emission::ProgressOnly
        } else {
            Emission::None
        };
        if emission != Emission::None {
            self.progress = progress;
        }

        let directive = if self.status == AnalysisStatus::Changed {
            self.knows_about_change = true;
            Directive::Changed {
                options: self
                    .pending
                    .as_ref()
                    .map(|pending| pending.options.clone())
                    .unwrap_or(Value::Null),
            }
        } else {
            Directive::Ok
        };

        Checkpoint {
            emission,
            directive,
        }
    }

    /// Classifies the slot after the runtime returned `payload_is_null`.
    pub fn finish_run(&mut self, payload_is_null: bool) -> RunOutcome {
        match self.status {
            AnalysisStatus::ToInit
            | AnalysisStatus::ToRun
            | AnalysisStatus::SaveImg
            | AnalysisStatus::EditImg
            | AnalysisStatus::RewriteImgs => RunOutcome::Superseded,
            AnalysisStatus::Changed if !self.knows_about_change || payload_is_null => {
                self.status = AnalysisStatus::ToInit;
                RunOutcome::Restart {
                    discard_temp_files: payload_is_null,
                }
            }
            AnalysisStatus::Initing | AnalysisStatus::Running | AnalysisStatus::Changed => {
                let send = !self.rich_results();
                if send {
                    self.status = if self.status == AnalysisStatus::Initing {
                        AnalysisStatus::Inited
                    } else {
                        AnalysisStatus::Complete
                    };
                    self.progress = -1;
                }
                RunOutcome::Deliver { send }
            }
            _ => {
                self.status = AnalysisStatus::Empty;
                RunOutcome::Dropped
            }
        }
    }

    /// The run produced something unusable; free the slot without a response.
    pub fn fail(&mut self) {
        self.status = AnalysisStatus::Empty;
    }

    /// Image requests finish synchronously.
    pub fn complete_image(&mut self) {
        self.status = AnalysisStatus::Complete;
        self.progress = -1;
    }

    /// Results are out; the slot is free. The id is kept for temp-file pruning.
    pub fn reset(&mut self) {
        self.status = AnalysisStatus::Empty;
    }
}
