//! Media file recognition by extension.

/// Extensions treated as audio by [`is_media_file`].
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "aac", "ac3", "wav", "wave", "flac", "wma"];

/// Extensions treated as video by [`is_media_file`].
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mpeg", "avi", "wmv"];

/// Returns `true` if `file` ends with any of `extensions`.
///
/// The match is an exact, case-sensitive suffix match on the raw name, so
/// `"mp3"` accepts both `song.mp3` and `songmp3`, but not `song.MP3`.
///
/// ```
/// use library::filter;
///
/// assert!(filter("/music/a.flac", &["mp3", "flac"]));
/// assert!(!filter("/music/a.FLAC", &["flac"]));
/// ```
pub fn filter<S: AsRef<str>>(file: &str, extensions: &[S]) -> bool {
    extensions.iter().any(|ext| file.ends_with(ext.as_ref()))
}

/// Returns `true` for any known audio or video extension.
pub fn is_media_file(file: &str) -> bool {
    filter(file, AUDIO_EXTENSIONS) || filter(file, VIDEO_EXTENSIONS)
}

/// Splits a delimited list, treating runs of delimiters as one.
///
/// Used for user-supplied extension lists such as `"mp3,,flac,"`.
pub fn parse_list(list: &str, delimiter: char) -> Vec<String> {
    list.split(delimiter)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
