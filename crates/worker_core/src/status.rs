use std::fmt;

/// Per-analysis status, meaningful while the engine is in `analysis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalysisStatus {
    #[default]
    Empty,
    ToInit,
    Initing,
    Inited,
    ToRun,
    Running,
    Changed,
    Aborted,
    Complete,
    SaveImg,
    EditImg,
    RewriteImgs,
    Error,
    Exception,
}

impl AnalysisStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::Empty => "empty",
            AnalysisStatus::ToInit => "toInit",
            AnalysisStatus::Initing => "initing",
            AnalysisStatus::Inited => "inited",
            AnalysisStatus::ToRun => "toRun",
            AnalysisStatus::Running => "running",
            AnalysisStatus::Changed => "changed",
            AnalysisStatus::Aborted => "aborted",
            AnalysisStatus::Complete => "complete",
            AnalysisStatus::SaveImg => "saveImg",
            AnalysisStatus::EditImg => "editImg",
            AnalysisStatus::RewriteImgs => "rewriteImgs",
            AnalysisStatus::Error => "error",
            AnalysisStatus::Exception => "exception",
        }
    }

    /// A runtime call for this status is on the stack.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            AnalysisStatus::Initing
                | AnalysisStatus::Running
                | AnalysisStatus::SaveImg
                | AnalysisStatus::EditImg
                | AnalysisStatus::RewriteImgs
        )
    }

    /// Work is queued for the next loop iteration.
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            AnalysisStatus::ToInit
                | AnalysisStatus::ToRun
                | AnalysisStatus::Changed
                | AnalysisStatus::SaveImg
                | AnalysisStatus::EditImg
                | AnalysisStatus::RewriteImgs
        )
    }

    /// The analysis whose runtime call is on the stack still owns the slot.
    pub const fn owns_running_call(self) -> bool {
        matches!(
            self,
            AnalysisStatus::Initing | AnalysisStatus::Running | AnalysisStatus::Changed
        )
    }

    /// Request fields are snapshotted when a message lands in one of these.
    pub const fn captures_request(self) -> bool {
        matches!(
            self,
            AnalysisStatus::ToInit
                | AnalysisStatus::ToRun
                | AnalysisStatus::Changed
                | AnalysisStatus::SaveImg
                | AnalysisStatus::EditImg
                | AnalysisStatus::RewriteImgs
        )
    }

    /// Result status reported when the payload does not carry its own.
    pub const fn result_status(self) -> ResultStatus {
        match self {
            AnalysisStatus::Inited => ResultStatus::Inited,
            AnalysisStatus::Running | AnalysisStatus::Changed => ResultStatus::Running,
            AnalysisStatus::Complete => ResultStatus::Complete,
            _ => ResultStatus::FatalError,
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `perform` field of an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Perform {
    Init,
    Run,
    SaveImg,
    EditImg,
    RewriteImgs,
}

impl Perform {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "init" => Some(Perform::Init),
            "run" => Some(Perform::Run),
            "saveImg" => Some(Perform::SaveImg),
            "editImg" => Some(Perform::EditImg),
            "rewriteImgs" => Some(Perform::RewriteImgs),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Perform::Init => "init",
            Perform::Run => "run",
            Perform::SaveImg => "saveImg",
            Perform::EditImg => "editImg",
            Perform::RewriteImgs => "rewriteImgs",
        }
    }
}

/// The `status` field of an analysis response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultStatus {
    Empty,
    Waiting,
    Inited,
    Running,
    Changed,
    Complete,
    ValidationError,
    FatalError,
    ImageSaved,
    ImageEdited,
    ImagesRewritten,
    Exception,
}

impl ResultStatus {
    const ALL: [ResultStatus; 12] = [
        ResultStatus::Empty,
        ResultStatus::Waiting,
        ResultStatus::Inited,
        ResultStatus::Running,
        ResultStatus::Changed,
        ResultStatus::Complete,
        ResultStatus::ValidationError,
        ResultStatus::FatalError,
        ResultStatus::ImageSaved,
        ResultStatus::ImageEdited,
        ResultStatus::ImagesRewritten,
        ResultStatus::Exception,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Empty => "empty",
            ResultStatus::Waiting => "waiting",
            ResultStatus::Inited => "inited",
            ResultStatus::Running => "running",
            ResultStatus::Changed => "changed",
            ResultStatus::Complete => "complete",
            ResultStatus::ValidationError => "validationError",
            ResultStatus::FatalError => "fatalError",
            ResultStatus::ImageSaved => "imageSaved",
            ResultStatus::ImageEdited => "imageEdited",
            ResultStatus::ImagesRewritten => "imagesRewritten",
            ResultStatus::Exception => "exception",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == name)
    }

    /// No further responses follow for the same run.
    pub const fn is_terminal(self) -> bool {
        !matches!(
            self,
            ResultStatus::Running | ResultStatus::Changed | ResultStatus::Waiting
        )
    }
}

/// Representation a computed column is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Scale,
    Ordinal,
    Nominal,
    NominalText,
}

impl ColumnType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "scale" => Some(ColumnType::Scale),
            "ordinal" => Some(ColumnType::Ordinal),
            "nominal" => Some(ColumnType::Nominal),
            "nominalText" => Some(ColumnType::NominalText),
            _ => None,
        }
    }

    /// Runtime function that writes values of this type into the dataset.
    pub const fn setter_function(self) -> &'static str {
        match self {
            ColumnType::Scale => ".setColumnDataAsScale",
            ColumnType::Ordinal => ".setColumnDataAsOrdinal",
            ColumnType::Nominal => ".setColumnDataAsNominal",
            ColumnType::NominalText => ".setColumnDataAsNominalText",
        }
    }
}
