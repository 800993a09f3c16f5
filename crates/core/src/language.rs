//! Static language table.
//!
//! Maps a language code (as typed on the command line, e.g. `es` or `zh-CN`) to the
//! name shown to the learner and the tutor, the platform voices to try when speaking,
//! and the locale handed to the speech recognizer.

/// Display name used when a code is not in the table.
pub const UNKNOWN_LANGUAGE: &str = "Unknown language";
/// Recognizer locale used when a code has no dedicated entry.
pub const DEFAULT_RECOGNIZER_LOCALE: &str = "en-US";
/// Voice list used when a code has no dedicated voices.
const DEFAULT_VOICES: &[&str] = &["Samantha"];

const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("af", "Afrikaans"),
    ("ar", "Arabic"),
    ("bg", "Bulgarian"),
    ("bn", "Bengali"),
    ("bs", "Bosnian"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("gu", "Gujarati"),
    ("hi", "Hindi"),
    ("hr", "Croatian"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("is", "Icelandic"),
    ("it", "Italian"),
    ("iw", "Hebrew"),
    ("ja", "Japanese"),
    ("jw", "Javanese"),
    ("km", "Khmer"),
    ("kn", "Kannada"),
    ("ko", "Korean"),
    ("la", "Latin"),
    ("lv", "Latvian"),
    ("ml", "Malayalam"),
    ("mr", "Marathi"),
    ("ms", "Malay"),
    ("my", "Myanmar (Burmese)"),
    ("ne", "Nepali"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("si", "Sinhala"),
    ("sk", "Slovak"),
    ("sq", "Albanian"),
    ("sr", "Serbian"),
    ("su", "Sundanese"),
    ("sv", "Swedish"),
    ("sw", "Swahili"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tl", "Filipino"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("vi", "Vietnamese"),
    ("zh-CN", "Chinese (Simplified)"),
    ("zh-TW", "Chinese (Mandarin/Taiwan)"),
    ("zh", "Chinese (Mandarin)"),
];

// Voices installed with macOS, best first.
const VOICES: &[(&str, &[&str])] = &[
    ("es", &["Mónica", "Juan", "Diego", "Jorge"]),
    ("en", &["Samantha", "Alex", "Fred", "Victoria"]),
    ("fr", &["Thomas", "Amelie", "Marie", "Daniel"]),
    ("de", &["Anna", "Helena", "Markus", "Yannick"]),
    ("it", &["Alice", "Luca", "Federica", "Paolo"]),
    ("pt", &["Joana", "Luciana", "Tiago", "Felipe"]),
    ("ru", &["Milena", "Yuri", "Katya", "Alexei"]),
    ("zh-CN", &["Ting-Ting", "Sin-Ji", "Li-Mu", "Mei-Jia"]),
    ("ko", &["Yuna", "Joon", "Sora", "Jihun"]),
    ("hi", &["Lekha", "Rishi", "Aditi", "Pranav"]),
    ("ja", &["Kyoko", "Otoya", "Hattori", "Sayaka"]),
];

const RECOGNIZER_LOCALES: &[(&str, &str)] = &[
    ("es", "es-419"),
    ("en", "en-US"),
    ("fr", "fr"),
    ("de", "de"),
    ("it", "it"),
    ("pt", "pt"),
    ("zh-CN", "zh-CN"),
    ("ja", "ja"),
    ("ko", "ko"),
    ("hi", "hi"),
    ("ru", "ru"),
    ("nl", "nl"),
    ("pl", "pl"),
    ("tr", "tr"),
    ("uk", "uk"),
    ("vi", "vi"),
    ("id", "id"),
    ("th", "th"),
    ("bg", "bg"),
    ("ca", "ca"),
    ("da", "da"),
    ("fi", "fi"),
    ("el", "el"),
    ("hu", "hu"),
    ("lt", "lt"),
    ("lv", "lv"),
    ("ro", "ro"),
    ("sk", "sk"),
    ("sv", "sv"),
];

fn find<T: Copy>(table: &[(&str, T)], code: &str) -> Option<T> {
    table
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, value)| *value)
}

/// Everything the session needs to know about the target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    /// The code exactly as requested.
    pub code: String,
    pub display_name: &'static str,
    /// Platform voices to try in order; the universal default is appended by
    /// [`crate::voice::VoiceFallbackSelector`].
    pub voice_candidates: &'static [&'static str],
    pub recognizer_locale: &'static str,
}

impl LanguageProfile {
    /// Looks up a language code. Unknown codes still yield a usable profile.
    pub fn lookup(code: &str) -> Self {
        Self {
            code: code.to_string(),
            display_name: find(DISPLAY_NAMES, code).unwrap_or(UNKNOWN_LANGUAGE),
            voice_candidates: find(VOICES, code).unwrap_or(DEFAULT_VOICES),
            recognizer_locale: find(RECOGNIZER_LOCALES, code).unwrap_or(DEFAULT_RECOGNIZER_LOCALE),
        }
    }

    /// True when the code has a display name of its own.
    pub fn is_known(&self) -> bool {
        self.display_name != UNKNOWN_LANGUAGE
    }
}
