//! Pipeline script writer.
//!
//! Walks the visible committed layers of a session and emits one line
//! per layer that reproduces it, framed by an import line, a load line
//! and a save line. Two dialects are supported:
//!
//! - [`ScriptDialect::Native`]: the lamina script grammar, replayable
//!   bit-for-bit by [`Recipe`](crate::Recipe).
//! - [`ScriptDialect::OpenCv`]: a Python/OpenCV rendition for interop.
//!   Close to, but not bit-identical with, the native filters.
//!
//! Layers whose operation was not recorded, and layers committed on a
//! base that is no longer the preceding visible layer, are reported as
//! [`ExportAdvisory`] values next to the text.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use lamina_pipeline::filter::{FilterSpec, hysteresis_thresholds};
use lamina_pipeline::{EditSession, ImageOps, Layer, LayerOrigin};

/// Load path used when the session has no known source file.
pub const PLACEHOLDER_SOURCE: &str = "your_image.png";

/// Save path used when no output path is configured.
pub const DEFAULT_OUTPUT_PATH: &str = "edited_output.png";

/// Output language of an exported script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptDialect {
    /// lamina's own line-oriented grammar.
    #[default]
    Native,
    /// Python using `cv2` and `numpy`.
    OpenCv,
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Script language.
    pub dialect: ScriptDialect,
    /// Path written by the script's save line.
    pub output_path: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            dialect: ScriptDialect::default(),
            output_path: DEFAULT_OUTPUT_PATH.to_owned(),
        }
    }
}

/// A non-fatal note about the exported script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "advisory", rename_all = "snake_case")]
pub enum ExportAdvisory {
    /// The layer was not produced by a catalog filter, so the script
    /// only holds a placeholder comment for it.
    MissingOperationDetail {
        /// Layer index.
        index: usize,
        /// Layer label.
        label: String,
    },
    /// The layer was committed on top of a different layer than the
    /// one now visible before it. The script still follows the visible
    /// order, but will not reproduce the composite exactly.
    DivergentLineage {
        /// Layer index.
        index: usize,
        /// The preceding visible layer the script applies it to.
        expected_base: usize,
        /// The layer it was actually computed from.
        actual_base: usize,
    },
}

impl fmt::Display for ExportAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOperationDetail { index, label } => {
                write!(f, "layer {index} ({label}) has no recorded operation")
            }
            Self::DivergentLineage {
                index,
                expected_base,
                actual_base,
            } => write!(
                f,
                "layer {index} was computed from layer {actual_base}, \
                 but follows layer {expected_base} in the visible stack"
            ),
        }
    }
}

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedScript {
    /// The script source.
    pub text: String,
    /// Anything that weakens the reproducibility of `text`.
    pub advisories: Vec<ExportAdvisory>,
}

impl ExportedScript {
    /// Whether replaying the script is expected to reproduce the
    /// composite exactly.
    #[must_use]
    pub fn is_faithful(&self) -> bool {
        self.advisories.is_empty()
    }
}

/// Export the visible committed layers of `session`.
///
/// A session with no image loaded exports a script that only loads and
/// saves.
#[must_use]
pub fn export<O: ImageOps>(session: &EditSession<O>, options: &ExportOptions) -> ExportedScript {
    export_layers(session.layer_list(), session.source_path(), options)
}

/// Export `layers` (index 0 being the original) as a script that loads
/// `source_path`.
#[must_use]
pub fn export_layers(
    layers: &[Layer],
    source_path: Option<&str>,
    options: &ExportOptions,
) -> ExportedScript {
    let source = source_path.unwrap_or(PLACEHOLDER_SOURCE);
    let writer: &dyn DialectWriter = match options.dialect {
        ScriptDialect::Native => &Native,
        ScriptDialect::OpenCv => &OpenCv,
    };

    let mut text = String::new();
    let mut advisories = Vec::new();
    writer.prologue(&mut text, source);

    let mut previous = 0;
    for (index, layer) in layers.iter().enumerate().skip(1) {
        if !layer.is_visible() {
            continue;
        }
        match layer.origin() {
            LayerOrigin::Filter { spec, base } => {
                if *base != previous {
                    advisories.push(ExportAdvisory::DivergentLineage {
                        index,
                        expected_base: previous,
                        actual_base: *base,
                    });
                }
                writer.step(&mut text, spec);
            }
            LayerOrigin::Untracked | LayerOrigin::Original => {
                advisories.push(ExportAdvisory::MissingOperationDetail {
                    index,
                    label: layer.label().to_owned(),
                });
                writer.placeholder(&mut text, index, layer.label());
            }
        }
        previous = index;
    }

    writer.epilogue(&mut text, &options.output_path);
    ExportedScript { text, advisories }
}

/// Quote `s` as a double-quoted string literal, escaping `\`, `"` and
/// newlines. The result is valid in both dialects.
#[must_use]
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

trait DialectWriter {
    fn prologue(&self, out: &mut String, source: &str);
    fn step(&self, out: &mut String, spec: &FilterSpec);
    fn placeholder(&self, out: &mut String, index: usize, label: &str);
    fn epilogue(&self, out: &mut String, output: &str);
}

struct Native;

impl DialectWriter for Native {
    fn prologue(&self, out: &mut String, source: &str) {
        let _ = writeln!(out, "import lamina");
        let _ = writeln!(out, "load {}", quote(source));
    }

    fn step(&self, out: &mut String, spec: &FilterSpec) {
        let name = spec.kind().name();
        let _ = match *spec {
            FilterSpec::Grayscale | FilterSpec::Sepia => writeln!(out, "{name}"),
            FilterSpec::Blur { kernel_size } => writeln!(out, "{name} kernel_size={kernel_size}"),
            FilterSpec::EdgeDetect { threshold } => {
                let (low, high) = hysteresis_thresholds(threshold);
                writeln!(out, "{name} low={low} high={high}")
            }
            FilterSpec::Brightness { delta } => writeln!(out, "{name} delta={delta}"),
            // f32 Display is the shortest text that parses back to the same value.
            FilterSpec::Contrast { scale } => writeln!(out, "{name} scale={scale}"),
        };
    }

    fn placeholder(&self, out: &mut String, index: usize, label: &str) {
        let _ = writeln!(
            out,
            "# layer {index} {}: operation not recorded",
            quote(label)
        );
    }

    fn epilogue(&self, out: &mut String, output: &str) {
        let _ = writeln!(out, "save {}", quote(output));
    }
}

struct OpenCv;

/// Sepia kernel in OpenCV's BGR channel order.
const SEPIA_BGR: &str = "np.array([[0.131, 0.534, 0.272], \
                         [0.168, 0.686, 0.349], \
                         [0.189, 0.769, 0.393]])";

impl DialectWriter for OpenCv {
    fn prologue(&self, out: &mut String, source: &str) {
        let _ = writeln!(out, "import cv2, numpy as np");
        let _ = writeln!(out, "img = cv2.imread({})", quote(source));
    }

    fn step(&self, out: &mut String, spec: &FilterSpec) {
        let _ = match *spec {
            FilterSpec::Grayscale => writeln!(
                out,
                "img = cv2.cvtColor(cv2.cvtColor(img, cv2.COLOR_BGR2GRAY), cv2.COLOR_GRAY2BGR)"
            ),
            FilterSpec::Blur { kernel_size: k } => {
                writeln!(out, "img = cv2.GaussianBlur(img, ({k}, {k}), 0)")
            }
            FilterSpec::EdgeDetect { threshold } => {
                let (low, high) = hysteresis_thresholds(threshold);
                writeln!(
                    out,
                    "img = cv2.cvtColor(cv2.Canny(cv2.cvtColor(img, cv2.COLOR_BGR2GRAY), \
                     {low}, {high}), cv2.COLOR_GRAY2BGR)"
                )
            }
            FilterSpec::Brightness { delta } => {
                writeln!(out, "img = cv2.convertScaleAbs(img, alpha=1, beta={delta})")
            }
            FilterSpec::Contrast { scale } => {
                writeln!(out, "img = cv2.convertScaleAbs(img, alpha={scale}, beta=0)")
            }
            FilterSpec::Sepia => writeln!(
                out,
                "img = np.clip(cv2.transform(img.astype(np.float32), {SEPIA_BGR}), 0, 255)\
                 .astype(np.uint8)"
            ),
        };
    }

    fn placeholder(&self, out: &mut String, index: usize, label: &str) {
        let _ = writeln!(
            out,
            "# layer {index} {}: operation not recorded",
            quote(label)
        );
    }

    fn epilogue(&self, out: &mut String, output: &str) {
        let _ = writeln!(out, "cv2.imwrite({}, img)", quote(output));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lamina_pipeline::{Image, LayerStack, RgbImage};

    fn solid() -> Image {
        Image::new(RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30])))
    }

    fn stack(specs: &[FilterSpec]) -> LayerStack {
        let mut stack = LayerStack::new(solid());
        for spec in specs {
            let base = stack.composite_index();
            stack.append(
                solid(),
                spec.label(),
                LayerOrigin::Filter { spec: *spec, base },
            );
        }
        stack
    }

    fn native(stack: &LayerStack, source: Option<&str>) -> ExportedScript {
        export_layers(stack.layers(), source, &ExportOptions::default())
    }

    #[test]
    fn original_only_exports_import_load_save() {
        let script = native(&stack(&[]), Some("a.png"));
        assert_eq!(
            script.text,
            "import lamina\nload \"a.png\"\nsave \"edited_output.png\"\n"
        );
        assert!(script.is_faithful());
    }

    #[test]
    fn unknown_source_uses_placeholder() {
        let script = native(&stack(&[]), None);
        assert!(script.text.contains("load \"your_image.png\""));
    }

    #[test]
    fn steps_follow_commit_order_with_literal_parameters() {
        let script = native(
            &stack(&[
                FilterSpec::Grayscale,
                FilterSpec::Blur { kernel_size: 5 },
                FilterSpec::EdgeDetect { threshold: 60 },
                FilterSpec::Brightness { delta: -20 },
                FilterSpec::Contrast { scale: 1.25 },
                FilterSpec::Sepia,
            ]),
            Some("a.png"),
        );
        let lines: Vec<&str> = script.text.lines().collect();
        assert_eq!(
            lines,
            [
                "import lamina",
                "load \"a.png\"",
                "grayscale",
                "blur kernel_size=5",
                "edge_detect low=60 high=120",
                "brightness delta=-20",
                "contrast scale=1.25",
                "sepia",
                "save \"edited_output.png\"",
            ]
        );
    }

    #[test]
    fn hidden_layers_are_skipped() {
        let mut layers = stack(&[FilterSpec::Grayscale, FilterSpec::Sepia]);
        layers.set_visibility(2, false).unwrap();
        let script = native(&layers, None);
        assert!(script.text.contains("grayscale"));
        assert!(!script.text.contains("sepia"));
        assert!(script.is_faithful());
    }

    #[test]
    fn untracked_layer_is_a_placeholder_with_advisory() {
        let mut layers = stack(&[FilterSpec::Grayscale]);
        layers.append(solid(), "paint\nstroke", LayerOrigin::Untracked);
        let script = native(&layers, None);

        assert!(
            script
                .text
                .contains("# layer 2 \"paint\\nstroke\": operation not recorded\n")
        );
        assert_eq!(
            script.advisories,
            [ExportAdvisory::MissingOperationDetail {
                index: 2,
                label: "paint\nstroke".into(),
            }]
        );
    }

    #[test]
    fn hiding_a_middle_layer_reports_divergent_lineage() {
        let mut layers = stack(&[FilterSpec::Grayscale, FilterSpec::Sepia]);
        layers.set_visibility(1, false).unwrap();
        let script = native(&layers, None);
        assert_eq!(
            script.advisories,
            [ExportAdvisory::DivergentLineage {
                index: 2,
                expected_base: 0,
                actual_base: 1,
            }]
        );
        assert!(!script.is_faithful());
        assert!(script.advisories[0].to_string().contains("layer 2"));
    }

    #[test]
    fn custom_output_path_is_quoted() {
        let options = ExportOptions {
            output_path: "out \"final\".png".into(),
            ..ExportOptions::default()
        };
        let script = export_layers(stack(&[]).layers(), None, &options);
        assert!(script.text.ends_with("save \"out \\\"final\\\".png\"\n"));
    }

    #[test]
    fn opencv_dialect_keeps_three_channels() {
        let options = ExportOptions {
            dialect: ScriptDialect::OpenCv,
            ..ExportOptions::default()
        };
        let layers = stack(&[
            FilterSpec::Grayscale,
            FilterSpec::Blur { kernel_size: 7 },
            FilterSpec::EdgeDetect { threshold: 100 },
        ]);
        let script = export_layers(layers.layers(), Some("in.jpg"), &options);
        let lines: Vec<&str> = script.text.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "import cv2, numpy as np");
        assert_eq!(lines[1], "img = cv2.imread(\"in.jpg\")");
        assert!(lines[2].ends_with("cv2.COLOR_GRAY2BGR)"));
        assert_eq!(lines[3], "img = cv2.GaussianBlur(img, (7, 7), 0)");
        assert!(lines[4].contains("cv2.Canny("));
        assert!(lines[4].contains("100, 200"));
        assert!(lines[4].ends_with("cv2.COLOR_GRAY2BGR)"));
        assert_eq!(lines[5], "cv2.imwrite(\"edited_output.png\", img)");
    }

    #[test]
    fn opencv_original_only_is_import_load_save() {
        let options = ExportOptions {
            dialect: ScriptDialect::OpenCv,
            ..ExportOptions::default()
        };
        let script = export_layers(stack(&[]).layers(), Some("a.png"), &options);
        assert_eq!(
            script.text,
            "import cv2, numpy as np\n\
             img = cv2.imread(\"a.png\")\n\
             cv2.imwrite(\"edited_output.png\", img)\n"
        );
    }

    #[test]
    fn opencv_tone_filters() {
        let options = ExportOptions {
            dialect: ScriptDialect::OpenCv,
            ..ExportOptions::default()
        };
        let layers = stack(&[
            FilterSpec::Brightness { delta: 15 },
            FilterSpec::Contrast { scale: 0.5 },
            FilterSpec::Sepia,
        ]);
        let text = export_layers(layers.layers(), None, &options).text;
        assert!(text.contains("convertScaleAbs(img, alpha=1, beta=15)"));
        assert!(text.contains("convertScaleAbs(img, alpha=0.5, beta=0)"));
        assert!(text.contains("cv2.transform("));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ExportOptions = serde_json::from_str(r#"{"dialect":"open_cv"}"#).unwrap();
        assert_eq!(options.dialect, ScriptDialect::OpenCv);
        assert_eq!(options.output_path, DEFAULT_OUTPUT_PATH);
    }

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote(r"C:\img"), r#""C:\\img""#);
        assert_eq!(quote("a\"b"), r#""a\"b""#);
        assert_eq!(quote("plain"), "\"plain\"");
    }
}
