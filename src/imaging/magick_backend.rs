//! Deferred engine: one `convert` invocation, run at save time.
//!
//! No pixels are held. Each transform builds a complete command line that
//! reads the on-disk source file and writes to a destination placeholder.
//! The command is stored as the *pending* command, replacing whatever was
//! pending before. A `flip` followed by `rotate` therefore runs only the
//! rotation. Integrators who need composition should save between steps.
//!
//! Because every command reads the untouched source file, the sizes reported
//! back to the session are always the source dimensions.
//!
//! ## Command shapes
//!
//! | Operation | Arguments |
//! |---|---|
//! | flip | `-flop` / `-flip` / `-flop -flip` `SRC DEST` |
//! | rotate | `-rotate DEG SRC DEST` |
//! | crop | `-quiet -strip -crop WxH+X+Y SRC DEST` |
//! | grayscale | `-colorspace Gray SRC DEST` |
//! | text | `-quiet -font F -pointsize S -draw "gravity south fill '#hex' text X,Y 'T' " SRC DEST` |
//! | adaptive thumb, resize canvas | `-quiet -strip -define jpeg:size=WxH SRC -thumbnail WxH> -background #hex -gravity center -extent WxH DEST` |
//! | resize | `-quiet -strip SRC -resize WxH! DEST` |
//! | watermark | `SRC ( MARK -resize WxH! ) -geometry +X+Y -composite DEST` |
//!
//! `DEST` expands to `-quality Q FORMAT:path` when the command runs.

use super::backend::{ImageBackend, ImageError, SaveOutcome};
use super::calculations::{Rect, Size};
use super::identify::ImageInfo;
use super::params::{
    CanvasParams, Color, FlipMode, ImageFormat, Quality, SaveParams, TextParams, ThumbParams,
    WatermarkParams,
};
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Marker shown in [`PendingCommand::template`] where the output goes.
pub const DEST_PLACEHOLDER: &str = "%dest%";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandArg {
    Literal(OsString),
    /// Replaced by `-quality Q FORMAT:path` at save time.
    Destination,
}

/// A `convert` command line waiting for its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    program: PathBuf,
    args: Vec<CommandArg>,
}

impl PendingCommand {
    fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args
            .push(CommandArg::Literal(arg.as_ref().to_os_string()));
        self
    }

    fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        args.into_iter().fold(self, |cmd, arg| cmd.arg(arg))
    }

    /// Append the destination placeholder. Each constructor calls this exactly once.
    fn dest(mut self) -> Self {
        self.args.push(CommandArg::Destination);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[CommandArg] {
        &self.args
    }

    /// Single-line form with the literal `%dest%` marker.
    pub fn template(&self) -> String {
        let mut parts = vec![quote(self.program.as_os_str())];
        parts.extend(self.args.iter().map(|arg| match arg {
            CommandArg::Literal(s) => quote(s),
            CommandArg::Destination => Cow::Borrowed(DEST_PLACEHOLDER),
        }));
        parts.join(" ")
    }

    /// Substitute the destination and produce a runnable argv.
    pub fn resolve(&self, format: ImageFormat, quality: Quality, path: &Path) -> ResolvedCommand {
        let mut target = OsString::from(format!("{}:", format.magick_coder()));
        target.push(path.as_os_str());

        let mut args = Vec::with_capacity(self.args.len() + 2);
        for arg in &self.args {
            match arg {
                CommandArg::Literal(s) => args.push(s.clone()),
                CommandArg::Destination => {
                    args.push("-quality".into());
                    args.push(quality.value().to_string().into());
                    args.push(target.clone());
                }
            }
        }
        ResolvedCommand {
            program: self.program.clone(),
            args,
        }
    }
}

/// A fully substituted command, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ResolvedCommand {
    /// Arguments as strings, lossily converted.
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(self.program.as_os_str()))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Shell-style quoting, for display only. Commands never go through a shell.
fn quote(arg: &OsStr) -> Cow<'_, str> {
    let s = arg.to_string_lossy();
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:+=,%#!>@^".contains(c));
    if plain {
        s
    } else {
        Cow::Owned(format!("'{}'", s.replace('\'', r"'\''")))
    }
}

/// What a finished process reported.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

/// Runs resolved commands. Blocking, single-shot, no retries.
pub trait CommandRunner {
    fn run(&self, command: &ResolvedCommand) -> std::io::Result<CommandOutput>;
}

/// Spawns the program directly (no shell) and waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ResolvedCommand) -> std::io::Result<CommandOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// The output path with its extension replaced by the format's canonical one.
pub fn normalized_destination(path: &Path, format: ImageFormat) -> PathBuf {
    path.with_extension(format.extension())
}

fn size_arg(size: Size) -> String {
    format!("{}x{}", size.width, size.height)
}

/// Deferred `convert` engine.
pub struct MagickBackend<R: CommandRunner = SystemRunner> {
    convert_path: PathBuf,
    runner: R,
    source: Option<ImageInfo>,
    pending: Option<PendingCommand>,
}

impl MagickBackend<SystemRunner> {
    pub fn new(convert_path: impl Into<PathBuf>) -> Self {
        Self::with_runner(convert_path, SystemRunner)
    }
}

impl<R: CommandRunner> MagickBackend<R> {
    pub fn with_runner(convert_path: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            convert_path: convert_path.into(),
            runner,
            source: None,
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn source(&self) -> Result<&ImageInfo, ImageError> {
        self.source.as_ref().ok_or(ImageError::NotLoaded)
    }

    /// Store `command` as the pending command, dropping any earlier one.
    fn replace_pending(&mut self, command: PendingCommand) -> Result<Size, ImageError> {
        let size = self.source()?.size;
        if let Some(previous) = self.pending.replace(command) {
            log::debug!("discarding pending command: {}", previous.template());
        }
        Ok(size)
    }

    /// `convert` with the given leading flags, then `SRC DEST`.
    fn simple(&self, flags: &[&str]) -> Result<PendingCommand, ImageError> {
        let source = &self.source()?.path;
        Ok(PendingCommand::new(&self.convert_path)
            .args(flags)
            .arg(source)
            .dest())
    }

    /// The shrink-and-extend pipeline shared by thumbnails and canvases.
    fn extent(&self, size: Size, background: Color) -> Result<PendingCommand, ImageError> {
        let source = &self.source()?.path;
        let dims = size_arg(size);
        Ok(PendingCommand::new(&self.convert_path)
            .args(["-quiet", "-strip", "-define"])
            .arg(format!("jpeg:size={dims}"))
            .arg(source)
            .arg("-thumbnail")
            .arg(format!("{dims}>"))
            .arg("-background")
            .arg(background.to_hex())
            .args(["-gravity", "center", "-extent"])
            .arg(&dims)
            .dest())
    }
}

impl<R: CommandRunner> ImageBackend for MagickBackend<R> {
    fn name(&self) -> &'static str {
        "magick"
    }

    fn load(&mut self, info: &ImageInfo) -> Result<(), ImageError> {
        self.source = Some(info.clone());
        self.pending = None;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ImageError> {
        self.source()?;
        self.pending = None;
        Ok(())
    }

    fn release(&mut self) {
        self.source = None;
        self.pending = None;
    }

    fn resize(&mut self, to: Size) -> Result<Size, ImageError> {
        let source = &self.source()?.path;
        let command = PendingCommand::new(&self.convert_path)
            .args(["-quiet", "-strip"])
            .arg(source)
            .arg("-resize")
            .arg(format!("{}!", size_arg(to)))
            .dest();
        self.replace_pending(command)
    }

    fn crop(&mut self, region: Rect) -> Result<Size, ImageError> {
        let geometry = format!(
            "{}x{}+{}+{}",
            region.width, region.height, region.x, region.y
        );
        let command = self.simple(&["-quiet", "-strip", "-crop", &geometry])?;
        self.replace_pending(command)
    }

    fn flip(&mut self, mode: FlipMode) -> Result<Size, ImageError> {
        let flags: &[&str] = match mode {
            FlipMode::Horizontal => &["-flop"],
            FlipMode::Vertical => &["-flip"],
            FlipMode::Both => &["-flop", "-flip"],
        };
        let command = self.simple(flags)?;
        self.replace_pending(command)
    }

    fn rotate(&mut self, degrees: i32) -> Result<Size, ImageError> {
        let command = self.simple(&["-rotate", &degrees.to_string()])?;
        self.replace_pending(command)
    }

    fn grayscale(&mut self) -> Result<Size, ImageError> {
        let command = self.simple(&["-colorspace", "Gray"])?;
        self.replace_pending(command)
    }

    fn watermark(&mut self, params: &WatermarkParams) -> Result<Size, ImageError> {
        let source = &self.source()?.path;
        let command = PendingCommand::new(&self.convert_path)
            .arg(source)
            .arg("(")
            .arg(&params.source)
            .arg("-resize")
            .arg(format!("{}!", size_arg(params.size)))
            .arg(")")
            .arg("-geometry")
            .arg(format!("{:+}{:+}", params.position.x, params.position.y))
            .arg("-composite")
            .dest();
        self.replace_pending(command)
    }

    fn text(&mut self, params: &TextParams<'_>) -> Result<Size, ImageError> {
        let draw = format!(
            "gravity south fill '{}' text {},{} '{}' ",
            params.color.to_hex(),
            params.position.x,
            params.position.y,
            params.text.replace('\'', r"\'"),
        );
        let source = &self.source()?.path;
        let command = PendingCommand::new(&self.convert_path)
            .args(["-quiet", "-font"])
            .arg(params.font.path())
            .arg("-pointsize")
            .arg(params.size.to_string())
            .arg("-draw")
            .arg(draw)
            .arg(source)
            .dest();
        self.replace_pending(command)
    }

    fn adaptive_thumb(&mut self, params: &ThumbParams) -> Result<Size, ImageError> {
        let command = self.extent(params.target, params.background)?;
        self.replace_pending(command)
    }

    fn resize_canvas(&mut self, params: &CanvasParams) -> Result<Size, ImageError> {
        let command = self.extent(params.canvas, params.background)?;
        self.replace_pending(command)
    }

    fn save(&mut self, params: &SaveParams) -> Result<SaveOutcome, ImageError> {
        let command = match &self.pending {
            Some(command) => command.clone(),
            None => self.simple(&[])?,
        };
        let dest = normalized_destination(&params.path, params.format);
        let resolved = command.resolve(params.format, params.quality, &dest);
        log::debug!("running {resolved}");

        let output = self.runner.run(&resolved).map_err(|e| {
            ImageError::SaveFailure(format!("cannot run {}: {e}", resolved.program.display()))
        })?;
        if !output.success {
            let status = output
                .code
                .map_or_else(|| "a signal".to_string(), |code| format!("status {code}"));
            return Err(ImageError::SaveFailure(format!(
                "{} exited with {status}: {}",
                resolved.program.display(),
                output.stderr.trim()
            )));
        }

        self.pending = None;
        Ok(SaveOutcome {
            path: dest,
            rebase: true,
        })
    }

    fn encode(
        &self,
        _out: &mut dyn Write,
        _format: ImageFormat,
        _quality: Quality,
    ) -> Result<(), ImageError> {
        Err(ImageError::Unsupported("streaming output from the magick engine"))
    }
}
