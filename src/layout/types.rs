use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Padding the layered solver uses when a compound carries none.
pub const SOLVER_DEFAULT_PADDING: f64 = 12.0;
/// Uniform cluster padding applied when the caller supplies none.
pub const DEFAULT_CLUSTER_PADDING: f64 = 24.0;
pub const DEFAULT_VIEWPORT_PADDING: f64 = 24.0;

static SIDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(top|left|bottom|right)\s*=\s*(-?[0-9]*\.?[0-9]+)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Padding {
    pub const fn uniform(value: f64) -> Self {
        Self {
            top: value,
            left: value,
            bottom: value,
            right: value,
        }
    }

    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Parses `"24"`, `"top,left,bottom,right"` or `"[top=38,left=20,bottom=20,right=20]"`.
    ///
    /// Sides missing from the bracketed form keep the solver default.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Some(inner) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let mut padding = Padding::uniform(SOLVER_DEFAULT_PADDING);
            let mut matched = false;
            for caps in SIDE_RE.captures_iter(inner) {
                let value = caps[2].parse::<f64>().ok()?;
                match &caps[1] {
                    "top" => padding.top = value,
                    "left" => padding.left = value,
                    "bottom" => padding.bottom = value,
                    _ => padding.right = value,
                }
                matched = true;
            }
            return matched.then_some(padding);
        }

        let parts: Vec<f64> = trimmed
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [value] => Some(Padding::uniform(*value)),
            [top, left, bottom, right] => Some(Padding::new(*top, *left, *bottom, *right)),
            _ => None,
        }
    }

    pub fn to_elk_string(&self) -> String {
        format!(
            "[top={},left={},bottom={},right={}]",
            self.top, self.left, self.bottom, self.right
        )
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

impl Default for Padding {
    fn default() -> Self {
        Padding::uniform(DEFAULT_CLUSTER_PADDING)
    }
}

/// Target canvas for the flat engines' fitting step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_viewport_padding")]
    pub padding: f64,
}

fn default_viewport_padding() -> f64 {
    DEFAULT_VIEWPORT_PADDING
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            padding: DEFAULT_VIEWPORT_PADDING,
        }
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortSide {
    Top,
    Right,
    Bottom,
    Left,
}

impl PortSide {
    pub fn as_token(self) -> &'static str {
        match self {
            PortSide::Top => "TOP",
            PortSide::Right => "RIGHT",
            PortSide::Bottom => "BOTTOM",
            PortSide::Left => "LEFT",
        }
    }
}
