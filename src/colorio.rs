// Copyright 2018 Peter Williams <peter@newton.cx>
// Licensed under the MIT License.

/*! Colorized CLI output.

There are a few common colorized output styles that we use. Use the
`cprint!` family of macros rather than calling into `ColorIo` directly.

*/

use failure::Error;
use std::fmt;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};


/// How to style some text to print.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Style {
    Green,
    Highlight,
    Plain,
    Red,
    Yellow,
}


/// Where to print some text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stream {
    Stderr,
    Stdout,
}


macro_rules! style {
    (green) => { $crate::colorio::Style::Green };
    (hl) => { $crate::colorio::Style::Highlight };
    (pl) => { $crate::colorio::Style::Plain };
    (red) => { $crate::colorio::Style::Red };
    (yellow) => { $crate::colorio::Style::Yellow };
}

macro_rules! cprint {
    ($cio:expr, $style:ident, $($fmt_args:expr),*) => {
        $cio.print_core($crate::colorio::Stream::Stdout, style!($style), format_args!($($fmt_args),*))
    };
}

macro_rules! cprintln {
    ($cio:expr, $style:ident, $($fmt_args:expr),*) => {
        cprint!($cio, $style, $($fmt_args),*);
        cprint!($cio, pl, "\n");
    };
}

macro_rules! ecprint {
    ($cio:expr, $style:ident, $($fmt_args:expr),*) => {
        $cio.print_core($crate::colorio::Stream::Stderr, style!($style), format_args!($($fmt_args),*))
    };
}

macro_rules! ecprintln {
    ($cio:expr, $style:ident, $($fmt_args:expr),*) => {
        ecprint!($cio, $style, $($fmt_args),*);
        ecprint!($cio, pl, "\n");
    };
}


/// State needed for our colorized I/O.
pub struct ColorIo {
    stdout: StandardStream,
    stderr: StandardStream,
    green: ColorSpec,
    highlight: ColorSpec,
    red: ColorSpec,
    yellow: ColorSpec,
}

impl ColorIo {
    pub fn new() -> Self {
        let bold = |color: Option<Color>| {
            let mut spec = ColorSpec::new();
            spec.set_fg(color).set_bold(true);
            spec
        };

        ColorIo {
            stdout: StandardStream::stdout(ColorChoice::Auto),
            stderr: StandardStream::stderr(ColorChoice::Auto),
            green: bold(Some(Color::Green)),
            highlight: bold(None),
            red: bold(Some(Color::Red)),
            yellow: bold(Some(Color::Yellow)),
        }
    }

    pub fn print_error(&mut self, err: Error) {
        for (i, cause) in err.iter_chain().enumerate() {
            if i == 0 {
                ecprint!(self, red, "error:");
            } else {
                ecprint!(self, pl, "  ");
                ecprint!(self, red, "caused by:");
            }

            ecprintln!(self, pl, " {}", cause);
        }
    }

    /// Print formatted arguments to one of the standard streams.
    #[inline(always)]
    pub fn print_core(&mut self, stream: Stream, style: Style, args: fmt::Arguments) {
        let stream = match stream {
            Stream::Stderr => &mut self.stderr,
            Stream::Stdout => &mut self.stdout,
        };

        let spec = match style {
            Style::Green => Some(&self.green),
            Style::Highlight => Some(&self.highlight),
            Style::Plain => None,
            Style::Red => Some(&self.red),
            Style::Yellow => Some(&self.yellow),
        };

        if let Some(spec) = spec {
            let _r = stream.set_color(spec);
        }

        let _r = write!(stream, "{}", args);

        if spec.is_some() {
            let _r = stream.reset();
        }
    }
}
