//! FFmpeg filter definitions used by the graph builder.

use promo_models::Resolution;

use crate::graph::{secs, FilterNode, Pin};

/// Wire `steps` into a linear chain starting at `input`.
///
/// Intermediate pads are named `{prefix}_{n}`; the last step writes `output`.
pub fn chain(input: Pin, steps: Vec<FilterNode>, prefix: &str, output: &str) -> Vec<FilterNode> {
    let count = steps.len();
    let mut current = input;
    let mut nodes = Vec::with_capacity(count);

    for (i, step) in steps.into_iter().enumerate() {
        let label = if i + 1 == count {
            output.to_string()
        } else {
            format!("{}_{}", prefix, i)
        };
        nodes.push(step.input(current).output(label.clone()));
        current = Pin::Label(label);
    }

    nodes
}

/// Fit a still into the frame without cropping, letterboxed with `color`.
pub fn fit_to_frame(resolution: Resolution, color: &str, fps: u32) -> Vec<FilterNode> {
    vec![
        FilterNode::new("scale")
            .param("w", resolution.width)
            .param("h", resolution.height)
            .param("force_original_aspect_ratio", "decrease"),
        FilterNode::new("pad")
            .param("w", resolution.width)
            .param("h", resolution.height)
            .param("x", "(ow-iw)/2")
            .param("y", "(oh-ih)/2")
            .param("color", color),
        FilterNode::new("setsar").positional(1),
        FilterNode::new("fps").positional(fps),
        FilterNode::new("format").positional("yuv420p"),
    ]
}

/// Crossfade `second` into `first` starting at `offset` seconds.
pub fn xfade(first: Pin, second: Pin, transition: &str, duration: f64, offset: f64, output: &str) -> FilterNode {
    FilterNode::new("xfade")
        .input(first)
        .input(second)
        .param("transition", transition)
        .param("duration", secs(duration))
        .param("offset", secs(offset))
        .output(output)
}

/// Concatenate video-only streams in order.
pub fn concat_video(inputs: Vec<Pin>, output: &str) -> FilterNode {
    let count = inputs.len();
    let node = inputs
        .into_iter()
        .fold(FilterNode::new("concat"), |node, pin| node.input(pin));
    node.param("n", count).param("v", 1).param("a", 0).output(output)
}

/// Square code image scaled to `size` pixels.
pub fn scale_square(size: u32) -> FilterNode {
    FilterNode::new("scale").param("w", size).param("h", size)
}

/// Overlay anchored to the bottom-right corner with a margin.
pub fn overlay_corner(base: Pin, top: Pin, margin: u32, output: &str) -> FilterNode {
    FilterNode::new("overlay")
        .input(base)
        .input(top)
        .param("x", format!("W-w-{}", margin))
        .param("y", format!("H-h-{}", margin))
        .param("shortest", 1)
        .output(output)
}

/// Overlay centered on the base stream.
pub fn overlay_center(base: Pin, top: Pin, output: &str) -> FilterNode {
    FilterNode::new("overlay")
        .input(base)
        .input(top)
        .param("x", "(W-w)/2")
        .param("y", "(H-h)/2")
        .param("shortest", 1)
        .output(output)
}

/// Duplicate one stream into `outputs.len()` pads.
pub fn split(input: Pin, outputs: &[&str]) -> FilterNode {
    outputs.iter().fold(
        FilterNode::new("split").input(input).positional(outputs.len()),
        |node, label| node.output(*label),
    )
}

/// Build filter for thumbnail generation.
pub fn filter_thumbnail(width: u32) -> String {
    format!("scale={}:-2", width)
}

/// Escape a value embedded unquoted in a filter option (paths, free text).
///
/// FFmpeg unescapes twice: once when splitting the filtergraph into filters
/// and again when splitting a filter's arguments into options.
pub fn escape_filter_value(value: &str) -> String {
    escape_chars(&escape_chars(value, &['\\', '\'', ':']), &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_chain_serialization() {
        let nodes = chain(
            Pin::video(2),
            fit_to_frame(Resolution::new(1080, 1920), "white", 30),
            "m2",
            "vm2",
        );
        let text: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        assert_eq!(
            text[0],
            "[2:v]scale=w=1080:h=1920:force_original_aspect_ratio=decrease[m2_0]"
        );
        assert_eq!(text[1], "[m2_0]pad=w=1080:h=1920:x=(ow-iw)/2:y=(oh-ih)/2:color=white[m2_1]");
        assert_eq!(text[2], "[m2_1]setsar=1[m2_2]");
        assert_eq!(text[3], "[m2_2]fps=30[m2_3]");
        assert_eq!(text[4], "[m2_3]format=yuv420p[vm2]");
    }

    #[test]
    fn test_concat_counts_inputs() {
        let node = concat_video(vec![Pin::label("a"), Pin::label("b"), Pin::label("c")], "vcat");
        assert_eq!(node.to_string(), "[a][b][c]concat=n=3:v=1:a=0[vcat]");
    }

    #[test]
    fn test_corner_overlay() {
        let node = overlay_corner(Pin::label("vmain"), Pin::label("code_small"), 20, "vmain_qr");
        assert_eq!(
            node.to_string(),
            "[vmain][code_small]overlay=x=W-w-20:y=H-h-20:shortest=1[vmain_qr]"
        );
    }

    #[test]
    fn test_split() {
        let node = split(Pin::label("code"), &["c1", "c2"]);
        assert_eq!(node.to_string(), "[code]split=2[c1][c2]");
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("https://x.y/a,b"), r"https\\://x.y/a\,b");
        assert_eq!(escape_filter_value("it's a:b,c"), r"it\\\'s a\\:b\,c");
        assert_eq!(escape_filter_value("[x];y"), r"\[x\]\;y");
        assert_eq!(escape_filter_value(r"C:\a"), r"C\\:\\\\a");
    }

    #[test]
    fn test_thumbnail_filter() {
        assert_eq!(filter_thumbnail(480), "scale=480:-2");
    }
}
