//! Subcommands.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a spoken conversation from the terminal.
    ///
    /// Each line is a finalized transcript. An empty line is a tap,
    /// `/end` ends the utterance and `/quit` exits.
    Talk {
        /// Write synthesized audio segments into this directory
        #[arg(long = "audio-dir")]
        audio_dir: Option<PathBuf>,
    },

    /// Send one message and print the reply sentence by sentence
    Ask {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Try the handshake with each known client identity
    Verify,

    /// Run a message as a background task and wait for it
    Task {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}
