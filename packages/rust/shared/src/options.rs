//! Configuration Builder: option tokens in, validated [`Configuration`] out.
//!
//! The scan is a single left-to-right pass. Every problem is collected and
//! reported together. A `-h/--help` token anywhere, even where a value was
//! expected, turns the whole scan into [`BuildOutcome::Help`].

use std::path::Path;
use std::str::FromStr;

use crate::config::DefaultsConfig;
use crate::error::{ConfigIssue, ConfigWarning, ConfigurationError};
use crate::types::OutputFormat;

/// Usage text printed for `-h/--help`.
pub const USAGE: &str = "\
usage: meshmaker [options] file.map\n\
\n\
Generate a mesh from the MAP/MRC file using the specified options\n\
\n\
Options:\n\
\t-c/--clevel <float>\n\t\t\tthe contour level at which to build the surface [default: 0.0]\n\
\t-o/--output <str>\n\t\t\tthe prefix of the output file to be combined with the extension (see below) [default: out]\n\
\t-S/--stl\toutput in STL format\n\
\t-V/--vtk\toutput in VTK format\n\
\t-X/--vtp\toutput in VTP format [default]\n\
\t-D/--decimate\tperform progressive decimation to eliminate superfluous polygons [default: false]\n\
\t-s/--smooth\tsmooth the generated surface [default: false]\n\
\t-i/--smooth-iter <int>\n\t\t\tnumber of iterations for smoothing (only applies if -s/--smooth is specified[default: 20]\n\
\t-t/--target-reduction <float>\n\t\t\tset the target reduction in the number of polygon in interval (0, 1) [default: 0.9]\n\
\t-A/--ascii\tsave data as ASCII as opposed to BINARY [default: false]\n\
\t-U/--uint64\tsave VTP headers using UInt64 as opposed to UInt32 [default: false]\n\
\t-I/--int32\tuse Int32 for vtkIdType instead of Int64 [default: false]\n\
\t-h/--help\tshow this help\n\
\t-v/--verbose\tverbose output\n";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Fully resolved processing options.
///
/// Only the builder can construct one, so every instance has passed
/// validation and carries an `output_path` derived from prefix and format.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    contour_level: f64,
    input_path: String,
    output_prefix: String,
    output_format: OutputFormat,
    decimate: bool,
    target_reduction: f64,
    smooth: bool,
    smooth_iterations: i32,
    ascii: bool,
    wide_headers: bool,
    narrow_indices: bool,
    verbose: bool,
    output_path: String,
}

impl Configuration {
    pub fn contour_level(&self) -> f64 {
        self.contour_level
    }

    pub fn input_path(&self) -> &Path {
        Path::new(&self.input_path)
    }

    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn decimate_enabled(&self) -> bool {
        self.decimate
    }

    pub fn target_reduction(&self) -> f64 {
        self.target_reduction
    }

    pub fn smooth_enabled(&self) -> bool {
        self.smooth
    }

    /// Requested smoothing iterations, as given (may be negative).
    pub fn smooth_iterations(&self) -> i32 {
        self.smooth_iterations
    }

    /// ASCII encoding instead of binary.
    pub fn ascii(&self) -> bool {
        self.ascii
    }

    /// UInt64 block headers in VTP output.
    pub fn wide_headers(&self) -> bool {
        self.wide_headers
    }

    /// Int32 connectivity/offset arrays in VTP output.
    pub fn narrow_indices(&self) -> bool {
        self.narrow_indices
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// `<prefix>.<extension>`, fixed at build time.
    pub fn output_path(&self) -> &Path {
        Path::new(&self.output_path)
    }
}

/// Terminal result of scanning the option tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// `-h/--help` was seen: print usage and stop successfully.
    Help,
    /// A validated configuration plus any non-fatal warnings.
    Ready {
        config: Configuration,
        warnings: Vec<ConfigWarning>,
    },
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    ContourLevel,
    Output,
    Stl,
    Vtk,
    Vtp,
    Decimate,
    Smooth,
    SmoothIterations,
    TargetReduction,
    Ascii,
    WideHeaders,
    NarrowIndices,
    Verbose,
    Help,
}

impl Flag {
    fn parse(token: &str) -> Option<Self> {
        let flag = match token {
            "-c" | "--clevel" => Self::ContourLevel,
            "-o" | "--output" => Self::Output,
            "-S" | "--stl" => Self::Stl,
            "-V" | "--vtk" => Self::Vtk,
            "-X" | "--vtp" => Self::Vtp,
            "-D" | "--decimate" => Self::Decimate,
            "-s" | "--smooth" => Self::Smooth,
            "-i" | "--smooth-iter" => Self::SmoothIterations,
            "-t" | "--target-reduction" => Self::TargetReduction,
            "-A" | "--ascii" => Self::Ascii,
            "-U" | "--uint64" => Self::WideHeaders,
            "-I" | "--int32" => Self::NarrowIndices,
            "-v" | "--verbose" => Self::Verbose,
            "-h" | "--help" => Self::Help,
            _ => return None,
        };
        Some(flag)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Scans option tokens on top of a set of defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    defaults: DefaultsConfig,
}

/// Values accumulated during the scan; never escapes [`ConfigBuilder::build`].
struct Draft {
    contour_level: f64,
    input_path: String,
    output_prefix: String,
    output_format: OutputFormat,
    decimate: bool,
    target_reduction: f64,
    smooth: bool,
    smooth_iterations: i32,
    ascii: bool,
    wide_headers: bool,
    narrow_indices: bool,
    verbose: bool,
}

impl Draft {
    fn from_defaults(defaults: &DefaultsConfig) -> Self {
        Self {
            contour_level: defaults.contour_level,
            input_path: String::new(),
            output_prefix: defaults.output_prefix.clone(),
            output_format: defaults.output_format,
            decimate: false,
            target_reduction: defaults.target_reduction,
            smooth: false,
            smooth_iterations: defaults.smooth_iterations,
            ascii: false,
            wide_headers: false,
            narrow_indices: false,
            verbose: false,
        }
    }

    fn finish(self) -> Configuration {
        let output_path = format!("{}.{}", self.output_prefix, self.output_format.extension());
        Configuration {
            contour_level: self.contour_level,
            input_path: self.input_path,
            output_prefix: self.output_prefix,
            output_format: self.output_format,
            decimate: self.decimate,
            target_reduction: self.target_reduction,
            smooth: self.smooth,
            smooth_iterations: self.smooth_iterations,
            ascii: self.ascii,
            wide_headers: self.wide_headers,
            narrow_indices: self.narrow_indices,
            verbose: self.verbose,
            output_path,
        }
    }
}

impl ConfigBuilder {
    /// Create a builder whose unset options fall back to `defaults`.
    pub fn new(defaults: DefaultsConfig) -> Self {
        Self { defaults }
    }

    /// Scan `tokens` and validate the result.
    ///
    /// Any token that is not a recognised flag is the input path; the last
    /// one wins. A value flag always consumes the following token, even when
    /// that token turns out not to be a number. Help is checked before the
    /// scan, so no other token can swallow it.
    pub fn build<I, S>(&self, tokens: I) -> Result<BuildOutcome, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if requests_help(&tokens) {
            return Ok(BuildOutcome::Help);
        }

        let mut draft = Draft::from_defaults(&self.defaults);
        let mut issues = Vec::new();
        let mut tokens = tokens.into_iter();

        while let Some(token) = tokens.next() {
            let Some(flag) = Flag::parse(&token) else {
                draft.input_path = token;
                continue;
            };

            match flag {
                Flag::Help => return Ok(BuildOutcome::Help),
                Flag::ContourLevel => {
                    if let Some(level) = take_number(&token, tokens.next(), &mut issues) {
                        draft.contour_level = level;
                    }
                }
                Flag::Output => match tokens.next() {
                    Some(prefix) => draft.output_prefix = prefix,
                    None => issues.push(ConfigIssue::MissingValue { flag: token }),
                },
                Flag::Stl => draft.output_format = OutputFormat::Stl,
                Flag::Vtk => draft.output_format = OutputFormat::LegacyVtk,
                Flag::Vtp => draft.output_format = OutputFormat::XmlVtp,
                Flag::Decimate => draft.decimate = true,
                Flag::Smooth => draft.smooth = true,
                Flag::SmoothIterations => {
                    if let Some(iterations) = take_number(&token, tokens.next(), &mut issues) {
                        draft.smooth_iterations = iterations;
                    }
                }
                Flag::TargetReduction => {
                    if let Some(reduction) = take_number(&token, tokens.next(), &mut issues) {
                        draft.target_reduction = reduction;
                    }
                }
                Flag::Ascii => draft.ascii = true,
                Flag::WideHeaders => draft.wide_headers = true,
                Flag::NarrowIndices => draft.narrow_indices = true,
                Flag::Verbose => draft.verbose = true,
            }
        }

        if draft.input_path.is_empty() {
            issues.push(ConfigIssue::MissingInput);
        }

        if draft.decimate && !reduction_in_range(draft.target_reduction) {
            issues.push(ConfigIssue::Range {
                value: draft.target_reduction,
            });
        }

        if !issues.is_empty() {
            return Err(ConfigurationError { issues });
        }

        let mut warnings = Vec::new();
        if draft.wide_headers && draft.output_format != OutputFormat::XmlVtp {
            warnings.push(ConfigWarning::WideHeaderWithoutVtp {
                format: draft.output_format,
            });
        }

        Ok(BuildOutcome::Ready {
            config: draft.finish(),
            warnings,
        })
    }
}

/// Build a configuration from tokens using the built-in defaults.
pub fn build<I, S>(tokens: I) -> Result<BuildOutcome, ConfigurationError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ConfigBuilder::default().build(tokens)
}

/// True when any token is `-h` or `--help`.
///
/// Callers can check this before loading anything that might fail.
pub fn requests_help<S: AsRef<str>>(tokens: &[S]) -> bool {
    tokens
        .iter()
        .any(|t| matches!(Flag::parse(t.as_ref()), Some(Flag::Help)))
}

fn take_number<T: FromStr>(
    flag: &str,
    value: Option<String>,
    issues: &mut Vec<ConfigIssue>,
) -> Option<T> {
    let Some(value) = value else {
        issues.push(ConfigIssue::MissingValue { flag: flag.into() });
        return None;
    };

    match value.trim().parse::<T>() {
        Ok(number) => Some(number),
        Err(_) => {
            issues.push(ConfigIssue::Parse {
                flag: flag.into(),
                value,
            });
            None
        }
    }
}

/// Open interval (0, 1); NaN is out of range.
fn reduction_in_range(value: f64) -> bool {
    value > 0.0 && value < 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(tokens: &[&str]) -> (Configuration, Vec<ConfigWarning>) {
        match build(tokens.iter().copied()).expect("valid configuration") {
            BuildOutcome::Ready { config, warnings } => (config, warnings),
            BuildOutcome::Help => panic!("unexpected help outcome"),
        }
    }

    fn issues(tokens: &[&str]) -> Vec<ConfigIssue> {
        build(tokens.iter().copied())
            .expect_err("configuration should be rejected")
            .issues
    }

    #[test]
    fn defaults_apply_with_only_an_input() {
        let (config, warnings) = ready(&["file.map"]);
        assert_eq!(config.contour_level(), 0.0);
        assert_eq!(config.input_path(), Path::new("file.map"));
        assert_eq!(config.output_prefix(), "out");
        assert_eq!(config.output_format(), OutputFormat::XmlVtp);
        assert!(!config.decimate_enabled());
        assert_eq!(config.target_reduction(), 0.9);
        assert!(!config.smooth_enabled());
        assert_eq!(config.smooth_iterations(), 20);
        assert!(!config.ascii());
        assert!(!config.wide_headers());
        assert!(!config.narrow_indices());
        assert!(!config.verbose());
        assert_eq!(config.output_path(), Path::new("out.vtp"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn stl_example_resolves() {
        let (config, _) = ready(&["-c", "1.5", "-o", "mesh", "-S", "file.map"]);
        assert_eq!(config.contour_level(), 1.5);
        assert_eq!(config.output_format(), OutputFormat::Stl);
        assert_eq!(config.output_path(), Path::new("mesh.stl"));
        assert!(!config.decimate_enabled());
        assert!(!config.smooth_enabled());
    }

    #[test]
    fn long_flags_match_short_flags() {
        let (short, _) = ready(&[
            "-c", "2", "-o", "p", "-V", "-D", "-t", "0.5", "-s", "-i", "7", "-A", "-I", "-v",
            "in.map",
        ]);
        let (long, _) = ready(&[
            "--clevel",
            "2",
            "--output",
            "p",
            "--vtk",
            "--decimate",
            "--target-reduction",
            "0.5",
            "--smooth",
            "--smooth-iter",
            "7",
            "--ascii",
            "--int32",
            "--verbose",
            "in.map",
        ]);
        assert_eq!(short, long);
        assert_eq!(long.output_path(), Path::new("p.vtk"));
        assert_eq!(long.smooth_iterations(), 7);
        assert!(long.narrow_indices());
    }

    #[test]
    fn output_path_is_independent_of_option_order() {
        let (a, _) = ready(&["-o", "shape", "-V", "x.map"]);
        let (b, _) = ready(&["x.map", "-V", "-o", "shape"]);
        let (c, _) = ready(&["-V", "x.map", "-o", "shape"]);
        assert_eq!(a.output_path(), Path::new("shape.vtk"));
        assert_eq!(a.output_path(), b.output_path());
        assert_eq!(b.output_path(), c.output_path());
    }

    #[test]
    fn last_format_flag_wins() {
        let (config, _) = ready(&["-S", "-V", "-X", "-S", "f.map"]);
        assert_eq!(config.output_format(), OutputFormat::Stl);
    }

    #[test]
    fn last_positional_token_wins() {
        let (config, _) = ready(&["a.map", "-o", "x", "b.map"]);
        assert_eq!(config.input_path(), Path::new("b.map"));
        assert_eq!(config.output_path(), Path::new("x.vtp"));
    }

    #[test]
    fn missing_input_is_reported() {
        assert_eq!(issues(&["-S"]), vec![ConfigIssue::MissingInput]);
        assert_eq!(issues(&[]), vec![ConfigIssue::MissingInput]);
    }

    #[test]
    fn target_reduction_bounds_are_exclusive() {
        for bad in ["0", "1", "-0.1", "1.5", "NaN"] {
            let found = issues(&["-D", "-t", bad, "file.map"]);
            assert_eq!(found.len(), 1, "value {bad}");
            assert!(matches!(found[0], ConfigIssue::Range { .. }), "value {bad}");
        }

        let (config, _) = ready(&["-D", "-t", "0.5", "file.map"]);
        assert_eq!(config.target_reduction(), 0.5);
    }

    #[test]
    fn out_of_range_reduction_is_named() {
        let found = issues(&["-D", "-t", "1.2", "file.map"]);
        assert_eq!(found, vec![ConfigIssue::Range { value: 1.2 }]);
    }

    #[test]
    fn reduction_is_unchecked_without_decimation() {
        let (config, _) = ready(&["-t", "1.5", "file.map"]);
        assert_eq!(config.target_reduction(), 1.5);
        assert!(!config.decimate_enabled());
    }

    #[test]
    fn reduction_is_checked_when_decimate_follows_it() {
        let found = issues(&["-t", "2", "file.map", "-D"]);
        assert_eq!(found, vec![ConfigIssue::Range { value: 2.0 }]);
    }

    #[test]
    fn all_errors_are_collected_in_one_pass() {
        let found = issues(&["-c", "abc", "-i", "many", "-D", "-t", "3"]);
        assert_eq!(
            found,
            vec![
                ConfigIssue::Parse {
                    flag: "-c".into(),
                    value: "abc".into()
                },
                ConfigIssue::Parse {
                    flag: "-i".into(),
                    value: "many".into()
                },
                ConfigIssue::MissingInput,
                ConfigIssue::Range { value: 3.0 },
            ]
        );
    }

    #[test]
    fn failed_number_still_consumes_its_token() {
        // "file.map" is swallowed as the value of -c, so no input remains.
        let found = issues(&["-c", "file.map"]);
        assert_eq!(
            found,
            vec![
                ConfigIssue::Parse {
                    flag: "-c".into(),
                    value: "file.map".into()
                },
                ConfigIssue::MissingInput,
            ]
        );

        // A flag swallowed as a value is not interpreted as a flag.
        let found = issues(&["-t", "-S", "in.map"]);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_parse_error());
    }

    #[test]
    fn value_flag_at_end_is_missing_value() {
        let found = issues(&["file.map", "-c"]);
        assert_eq!(found, vec![ConfigIssue::MissingValue { flag: "-c".into() }]);

        let found = issues(&["file.map", "--output"]);
        assert_eq!(
            found,
            vec![ConfigIssue::MissingValue {
                flag: "--output".into()
            }]
        );
    }

    #[test]
    fn negative_iterations_are_accepted() {
        let (config, _) = ready(&["-s", "-i", "-3", "file.map"]);
        assert_eq!(config.smooth_iterations(), -3);
    }

    #[test]
    fn help_wins_anywhere() {
        assert_eq!(build(["--help"]).unwrap(), BuildOutcome::Help);
        assert_eq!(build(["-S", "file.map", "-h"]).unwrap(), BuildOutcome::Help);
        // Errors seen before help are discarded.
        assert_eq!(build(["-c", "abc", "-D", "-t", "9", "-h"]).unwrap(), BuildOutcome::Help);
        assert_eq!(build(["-h", "-c", "abc"]).unwrap(), BuildOutcome::Help);
    }

    #[test]
    fn help_in_value_position_still_wins() {
        assert_eq!(build(["-c", "--help", "file.map"]).unwrap(), BuildOutcome::Help);
        assert_eq!(build(["-o", "--help", "in.map"]).unwrap(), BuildOutcome::Help);
        assert_eq!(build(["-D", "-t", "-h"]).unwrap(), BuildOutcome::Help);
    }

    #[test]
    fn help_is_detected_without_building() {
        assert!(requests_help(&["-c", "--help"]));
        assert!(requests_help(&["file.map".to_string(), "-h".to_string()]));
        assert!(!requests_help(&["-o", "help", "file.map"]));
        assert!(!requests_help::<&str>(&[]));
    }

    #[test]
    fn wide_headers_with_non_vtp_warns() {
        let (config, warnings) = ready(&["-U", "-S", "file.map"]);
        assert!(config.wide_headers());
        assert_eq!(
            warnings,
            vec![ConfigWarning::WideHeaderWithoutVtp {
                format: OutputFormat::Stl
            }]
        );

        let (_, warnings) = ready(&["-U", "file.map"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn defaults_file_values_are_overridden_by_tokens() {
        let defaults = DefaultsConfig {
            contour_level: 0.75,
            output_prefix: "surface".into(),
            output_format: OutputFormat::LegacyVtk,
            target_reduction: 0.5,
            smooth_iterations: 5,
        };
        let builder = ConfigBuilder::new(defaults);

        let BuildOutcome::Ready { config, .. } = builder.build(["in.map"]).unwrap() else {
            panic!("expected configuration");
        };
        assert_eq!(config.contour_level(), 0.75);
        assert_eq!(config.output_path(), Path::new("surface.vtk"));
        assert_eq!(config.smooth_iterations(), 5);

        let BuildOutcome::Ready { config, .. } = builder.build(["in.map", "-X", "-c", "3"]).unwrap()
        else {
            panic!("expected configuration");
        };
        assert_eq!(config.contour_level(), 3.0);
        assert_eq!(config.output_path(), Path::new("surface.vtp"));
    }

    #[test]
    fn defaults_file_reduction_is_validated_when_decimating() {
        let defaults = DefaultsConfig {
            target_reduction: 1.0,
            ..DefaultsConfig::default()
        };
        let err = ConfigBuilder::new(defaults).build(["-D", "in.map"]).unwrap_err();
        assert_eq!(err.issues, vec![ConfigIssue::Range { value: 1.0 }]);
    }

    #[test]
    fn usage_lists_every_flag() {
        for flag in [
            "-c/--clevel", "-o/--output", "-S/--stl", "-V/--vtk", "-X/--vtp", "-D/--decimate",
            "-s/--smooth", "-i/--smooth-iter", "-t/--target-reduction", "-A/--ascii",
            "-U/--uint64", "-I/--int32", "-h/--help", "-v/--verbose",
        ] {
            assert!(USAGE.contains(flag), "usage is missing {flag}");
        }
        assert!(USAGE.starts_with("usage: meshmaker [options] file.map\n"));
    }
}
