// ABOUTME: Builds ffmpeg command lines that turn a video source into an HLS playlist.
// ABOUTME: Covers the live and file session profiles plus the looping generator profile.

use std::path::Path;

use serde::Serialize;

use crate::source::SourceKind;

/// File name of the playlist every profile writes into its output directory.
pub const PLAYLIST_FILENAME: &str = "stream.m3u8";

/// Target segment duration, in seconds, for API-started sessions.
pub const SEGMENT_SECONDS: u32 = 4;

/// Number of segments a live playlist keeps before older ones are deleted.
pub const LIVE_LIST_SIZE: u32 = 3;

/// A program plus its argument vector, ready to hand to a process spawner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Build the transcoder invocation for an API-started session.
    ///
    /// Live sources are pulled over TCP and encoded with the lowest-latency
    /// preset into a rolling playlist of [`LIVE_LIST_SIZE`] segments, with
    /// superseded segments deleted. File sources are read at native frame
    /// rate and every segment is kept so the whole file stays playable.
    pub fn session(program: &str, source: &str, kind: SourceKind, playlist: &Path) -> Self {
        let segment_seconds = SEGMENT_SECONDS.to_string();
        let mut args: Vec<String> = Vec::new();

        match kind {
            SourceKind::Live => {
                push_all(&mut args, &["-rtsp_transport", "tcp", "-i", source]);
                push_all(
                    &mut args,
                    &[
                        "-c:v",
                        "libx264",
                        "-preset",
                        "ultrafast",
                        "-tune",
                        "zerolatency",
                    ],
                );
                push_all(
                    &mut args,
                    &[
                        "-f",
                        "hls",
                        "-hls_time",
                        &segment_seconds,
                        "-hls_list_size",
                        &LIVE_LIST_SIZE.to_string(),
                        "-hls_flags",
                        "delete_segments",
                    ],
                );
            }
            SourceKind::File => {
                push_all(&mut args, &["-re", "-i", source]);
                push_all(&mut args, &["-c:v", "libx264", "-preset", "veryfast"]);
                // list size 0 keeps every segment in the playlist
                push_all(
                    &mut args,
                    &[
                        "-f",
                        "hls",
                        "-hls_time",
                        &segment_seconds,
                        "-hls_list_size",
                        "0",
                        "-hls_flags",
                        "independent_segments",
                    ],
                );
            }
        }

        args.push(playlist.to_string_lossy().into_owned());

        Self {
            program: program.to_string(),
            args,
        }
    }

    /// Build the foreground generator invocation.
    ///
    /// Local files are looped forever and paced in real time; network sources
    /// are pulled over TCP. Both feed a short rolling playlist of 2-second
    /// segments with a fixed GOP so segment boundaries line up.
    pub fn generator(program: &str, source: &str, local_file: bool, playlist: &Path) -> Self {
        let mut args: Vec<String> = Vec::new();

        if local_file {
            push_all(&mut args, &["-stream_loop", "-1", "-re"]);
        } else {
            push_all(&mut args, &["-rtsp_transport", "tcp", "-re"]);
        }

        push_all(
            &mut args,
            &[
                "-i",
                source,
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-tune",
                "zerolatency",
                "-g",
                "25",
                "-sc_threshold",
                "0",
                "-f",
                "hls",
                "-hls_time",
                "2",
                "-hls_list_size",
                "3",
                "-hls_flags",
                "delete_segments+append_list",
            ],
        );
        args.push(playlist.to_string_lossy().into_owned());

        Self {
            program: program.to_string(),
            args,
        }
    }

    /// Value following `flag` in the argument vector, if the flag is present.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Space-joined rendering for log lines.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Whether the generator should treat `source` as a local file to loop.
/// True for `.mp4` names (any case) and for paths that exist on disk.
pub fn is_local_file(source: &str) -> bool {
    source.to_ascii_lowercase().ends_with(".mp4") || Path::new(source).is_file()
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}
