/// Llama 2 chat models offered in the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelChoice {
    #[default]
    Llama2_7B,
    Llama2_13B,
    Llama2_70B,
}

impl ModelChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::Llama2_7B => "Llama2-7B",
            ModelChoice::Llama2_13B => "Llama2-13B",
            ModelChoice::Llama2_70B => "Llama2-70B",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "llama2-7b" => Some(ModelChoice::Llama2_7B),
            "llama2-13b" => Some(ModelChoice::Llama2_13B),
            "llama2-70b" => Some(ModelChoice::Llama2_70B),
            _ => None,
        }
    }

    pub fn all() -> Vec<ModelChoice> {
        vec![
            ModelChoice::Llama2_7B,
            ModelChoice::Llama2_13B,
            ModelChoice::Llama2_70B,
        ]
    }

    /// Replicate model identifier, `owner/name:version`.
    pub fn identifier(&self) -> &'static str {
        match self {
            ModelChoice::Llama2_7B => {
                "a16z-infra/llama7b-v2-chat:4f0a4744c7295c024a1de15e1a63c880d3da035fa1f49bfd344fe076074c8eea"
            }
            ModelChoice::Llama2_13B => {
                "a16z-infra/llama13b-v2-chat:df7690f1994d94e96ad9d568eac121aecf50684a0b0963b25a41cc40061269e5"
            }
            ModelChoice::Llama2_70B => {
                "replicate/llama70b-v2-chat:e951f18578850b652510200860fc4ea62b3b16fac280f83ff32282f87bbd2e48"
            }
        }
    }
}

/// Range, default and step of one sidebar slider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub step: f64,
}

impl SliderRange {
    /// Move `value` by `steps` increments, clamped to the range and snapped
    /// to the step grid anchored at `min`.
    pub fn nudge(&self, value: f64, steps: i32) -> f64 {
        self.snap(value + self.step * f64::from(steps))
    }

    pub fn snap(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        let index = ((clamped - self.min) / self.step).round();
        let snapped = (self.min + index * self.step).clamp(self.min, self.max);
        // Trim float noise such as 0.30000000000000004.
        (snapped * 1e6).round() / 1e6
    }
}

pub const TEMPERATURE: SliderRange = SliderRange {
    min: 0.01,
    max: 5.0,
    default: 0.1,
    step: 0.01,
};

pub const TOP_P: SliderRange = SliderRange {
    min: 0.01,
    max: 1.0,
    default: 0.9,
    step: 0.01,
};

pub const MAX_LENGTH: SliderRange = SliderRange {
    min: 64.0,
    max: 4096.0,
    default: 512.0,
    step: 8.0,
};

/// Model and sampling parameters for the next generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: ModelChoice,
    pub temperature: f64,
    pub top_p: f64,
    pub max_length: u32,
}

impl ModelConfig {
    pub fn new(model: ModelChoice) -> Self {
        Self {
            model,
            temperature: TEMPERATURE.default,
            top_p: TOP_P.default,
            max_length: MAX_LENGTH.default as u32,
        }
    }

    pub fn nudge_temperature(&mut self, steps: i32) {
        self.temperature = TEMPERATURE.nudge(self.temperature, steps);
    }

    pub fn nudge_top_p(&mut self, steps: i32) {
        self.top_p = TOP_P.nudge(self.top_p, steps);
    }

    pub fn nudge_max_length(&mut self, steps: i32) {
        self.max_length = MAX_LENGTH.nudge(f64::from(self.max_length), steps) as u32;
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(ModelChoice::default())
    }
}
