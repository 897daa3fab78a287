use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Returned when a string does not name a known fingerprint profile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown client identifier: {0}")]
pub struct UnknownClientIdentifier(pub String);

macro_rules! client_identifiers {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        /// Named fingerprint profile understood by the native engine.
        ///
        /// Each variant maps to a stable wire string. Adding a profile must
        /// never change the wire string of an existing one.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum ClientIdentifier {
            $($variant),+
        }

        impl ClientIdentifier {
            /// Every profile, in catalogue order.
            pub const ALL: &'static [ClientIdentifier] = &[$(ClientIdentifier::$variant),+];

            /// The identifier sent as `tlsClientIdentifier`.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(ClientIdentifier::$variant => $wire),+
                }
            }
        }
    };
}

client_identifiers! {
    Chrome103 => "chrome_103",
    Chrome104 => "chrome_104",
    Chrome105 => "chrome_105",
    Chrome106 => "chrome_106",
    Chrome107 => "chrome_107",
    Chrome108 => "chrome_108",
    Chrome109 => "chrome_109",
    Chrome110 => "chrome_110",
    Chrome111 => "chrome_111",
    Chrome112 => "chrome_112",
    Chrome116Psk => "chrome_116_PSK",
    Chrome116PskPq => "chrome_116_PSK_PQ",
    Chrome117 => "chrome_117",
    Chrome120 => "chrome_120",
    Chrome124 => "chrome_124",
    Chrome131 => "chrome_131",
    Chrome131Psk => "chrome_131_PSK",
    Chrome133 => "chrome_133",
    Chrome133Psk => "chrome_133_PSK",
    Safari15_6_1 => "safari_15_6_1",
    Safari16_0 => "safari_16_0",
    SafariIpad15_6 => "safari_ipad_15_6",
    SafariIos15_5 => "safari_ios_15_5",
    SafariIos15_6 => "safari_ios_15_6",
    SafariIos16_0 => "safari_ios_16_0",
    SafariIos17_0 => "safari_ios_17_0",
    SafariIos18_0 => "safari_ios_18_0",
    Firefox102 => "firefox_102",
    Firefox104 => "firefox_104",
    Firefox105 => "firefox_105",
    Firefox106 => "firefox_106",
    Firefox108 => "firefox_108",
    Firefox110 => "firefox_110",
    Firefox117 => "firefox_117",
    Firefox120 => "firefox_120",
    Firefox132 => "firefox_132",
    Opera89 => "opera_89",
    Opera90 => "opera_90",
    Opera91 => "opera_91",
    ZalandoAndroidMobile => "zalando_android_mobile",
    ZalandoIosMobile => "zalando_ios_mobile",
    NikeIosMobile => "nike_ios_mobile",
    NikeAndroidMobile => "nike_android_mobile",
    Cloudscraper => "cloudscraper",
    MmsIos => "mms_ios",
    MmsIos1 => "mms_ios_1",
    MmsIos2 => "mms_ios_2",
    MmsIos3 => "mms_ios_3",
    MeshIos => "mesh_ios",
    MeshIos1 => "mesh_ios_1",
    MeshIos2 => "mesh_ios_2",
    MeshAndroid => "mesh_android",
    MeshAndroid1 => "mesh_android_1",
    MeshAndroid2 => "mesh_android_2",
    ConfirmedIos => "confirmed_ios",
    ConfirmedAndroid => "confirmed_android",
    Okhttp4Android7 => "okhttp4_android_7",
    Okhttp4Android8 => "okhttp4_android_8",
    Okhttp4Android9 => "okhttp4_android_9",
    Okhttp4Android10 => "okhttp4_android_10",
    Okhttp4Android11 => "okhttp4_android_11",
    Okhttp4Android12 => "okhttp4_android_12",
    Okhttp4Android13 => "okhttp4_android_13",
}

impl fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientIdentifier {
    type Err = UnknownClientIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownClientIdentifier(s.to_owned()))
    }
}

impl Serialize for ClientIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_are_stable() {
        assert_eq!(ClientIdentifier::Chrome120.as_str(), "chrome_120");
        assert_eq!(ClientIdentifier::Chrome116PskPq.as_str(), "chrome_116_PSK_PQ");
        assert_eq!(ClientIdentifier::Safari15_6_1.as_str(), "safari_15_6_1");
        assert_eq!(ClientIdentifier::Okhttp4Android13.as_str(), "okhttp4_android_13");
    }

    #[test]
    fn wire_strings_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for id in ClientIdentifier::ALL {
            assert!(seen.insert(id.as_str()), "duplicate wire string {id}");
        }
    }

    #[test]
    fn parses_from_wire_string() {
        assert_eq!(
            "firefox_132".parse::<ClientIdentifier>(),
            Ok(ClientIdentifier::Firefox132)
        );
        assert!("netscape_4".parse::<ClientIdentifier>().is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let value = serde_json::to_value(ClientIdentifier::Opera91).unwrap();
        assert_eq!(value, serde_json::json!("opera_91"));
    }
}
