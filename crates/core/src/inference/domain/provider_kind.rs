use std::fmt;

/// Hardware inference backends the pipeline knows how to request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Cpu,
    Cuda,
    TensorRt,
    Rocm,
    CoreMl,
    DirectMl,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Cpu,
        ProviderKind::Cuda,
        ProviderKind::TensorRt,
        ProviderKind::Rocm,
        ProviderKind::CoreMl,
        ProviderKind::DirectMl,
    ];

    /// Parse a provider name, accepting both short names (`cuda`) and
    /// ONNX Runtime names (`CUDAExecutionProvider`), case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let short = lower.strip_suffix("executionprovider").unwrap_or(&lower);
        match short {
            "cpu" => Some(ProviderKind::Cpu),
            "cuda" => Some(ProviderKind::Cuda),
            "tensorrt" => Some(ProviderKind::TensorRt),
            "rocm" => Some(ProviderKind::Rocm),
            "coreml" => Some(ProviderKind::CoreMl),
            "directml" | "dml" => Some(ProviderKind::DirectMl),
            _ => None,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            ProviderKind::Cpu => "cpu",
            ProviderKind::Cuda => "cuda",
            ProviderKind::TensorRt => "tensorrt",
            ProviderKind::Rocm => "rocm",
            ProviderKind::CoreMl => "coreml",
            ProviderKind::DirectMl => "directml",
        }
    }

    pub fn ort_name(self) -> &'static str {
        match self {
            ProviderKind::Cpu => "CPUExecutionProvider",
            ProviderKind::Cuda => "CUDAExecutionProvider",
            ProviderKind::TensorRt => "TensorrtExecutionProvider",
            ProviderKind::Rocm => "ROCMExecutionProvider",
            ProviderKind::CoreMl => "CoreMLExecutionProvider",
            ProviderKind::DirectMl => "DmlExecutionProvider",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
