//! Typed filter graph nodes and pins.

use std::fmt;

/// Stream type selected from a positional input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Video,
    Audio,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Video => "v",
            StreamType::Audio => "a",
        }
    }
}

/// A pad connecting filters: either a stream of a positional input or a
/// label created by another node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pin {
    Input { index: usize, stream: StreamType },
    Label(String),
}

impl Pin {
    pub fn video(index: usize) -> Self {
        Pin::Input {
            index,
            stream: StreamType::Video,
        }
    }

    pub fn audio(index: usize) -> Self {
        Pin::Input {
            index,
            stream: StreamType::Audio,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Pin::Label(name.into())
    }

    pub fn label_name(&self) -> Option<&str> {
        match self {
            Pin::Label(name) => Some(name),
            Pin::Input { .. } => None,
        }
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pin::Input { index, stream } => write!(f, "[{}:{}]", index, stream.as_str()),
            Pin::Label(name) => write!(f, "[{}]", name),
        }
    }
}

/// One filter option. Positional options have no key.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParam {
    pub key: Option<String>,
    pub value: String,
}

impl fmt::Display for FilterParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}={}", key, self.value),
            None => f.write_str(&self.value),
        }
    }
}

/// A single filter with its input and output pads.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    pub inputs: Vec<Pin>,
    pub name: String,
    pub params: Vec<FilterParam>,
    pub outputs: Vec<String>,
}

impl FilterNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inputs: Vec::new(),
            name: name.into(),
            params: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, pin: Pin) -> Self {
        self.inputs.push(pin);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push(FilterParam {
            key: Some(key.into()),
            value: value.to_string(),
        });
        self
    }

    pub fn positional(mut self, value: impl ToString) -> Self {
        self.params.push(FilterParam {
            key: None,
            value: value.to_string(),
        });
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pin in &self.inputs {
            write!(f, "{}", pin)?;
        }
        f.write_str(&self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            write!(f, "{}", param)?;
        }
        for label in &self.outputs {
            write!(f, "[{}]", label)?;
        }
        Ok(())
    }
}

/// Wrap an expression in single quotes so commas survive graph parsing.
pub fn quoted(expr: &str) -> String {
    format!("'{}'", expr.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Format seconds for filter parameters.
pub fn secs(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_display() {
        assert_eq!(Pin::video(0).to_string(), "[0:v]");
        assert_eq!(Pin::audio(3).to_string(), "[3:a]");
        assert_eq!(Pin::label("vmain").to_string(), "[vmain]");
    }

    #[test]
    fn test_node_display() {
        let node = FilterNode::new("xfade")
            .input(Pin::label("m0"))
            .input(Pin::label("m1"))
            .param("transition", "fade")
            .param("duration", secs(1.0))
            .param("offset", secs(10.0))
            .output("x1");
        assert_eq!(
            node.to_string(),
            "[m0][m1]xfade=transition=fade:duration=1:offset=10[x1]"
        );
    }

    #[test]
    fn test_positional_param() {
        let node = FilterNode::new("setsar").positional(1);
        assert_eq!(node.to_string(), "setsar=1");
        assert_eq!(FilterNode::new("anull").to_string(), "anull");
    }

    #[test]
    fn test_secs_formatting() {
        assert_eq!(secs(5.0), "5");
        assert_eq!(secs(2.5), "2.5");
        assert_eq!(secs(1.0 / 3.0), "0.333");
        assert_eq!(secs(0.0), "0");
    }

    #[test]
    fn test_quoted_expression() {
        assert_eq!(quoted("if(lt(t,5),0.3,0.15)"), "'if(lt(t,5),0.3,0.15)'");
    }
}
