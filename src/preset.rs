use serde::{Deserialize, Serialize};

use crate::field::EntryFields;
use crate::time_slot::SLOT_MINUTES;

fn default_duration_minutes() -> u32 {
    SLOT_MINUTES
}

/// よく使う入力内容を名前付きで保存したテンプレート。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    #[serde(flatten)]
    pub fields: EntryFields,
}

impl Preset {
    /// 適用時に追加するスライスの数。30分に満たない端数は1スライスに切り上げる。
    pub fn slices(&self) -> usize {
        self.duration_minutes.div_ceil(SLOT_MINUTES).max(1) as usize
    }
}

/// 名前または識別子が一致するプリセットを探す。
pub fn find_preset<'a>(presets: &'a [Preset], key: &str) -> Option<&'a Preset> {
    presets
        .iter()
        .find(|preset| preset.id == key)
        .or_else(|| presets.iter().find(|preset| preset.name == key))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{find_preset, Preset};
    use crate::field::EntryFields;

    #[rstest]
    #[case(0, 1)]
    #[case(30, 1)]
    #[case(45, 2)]
    #[case(90, 3)]
    fn test_slices(#[case] duration_minutes: u32, #[case] expected: usize) {
        let preset = Preset {
            id: "p".to_string(),
            name: "p".to_string(),
            duration_minutes,
            fields: EntryFields::default(),
        };

        assert_eq!(preset.slices(), expected);
    }

    #[test]
    fn test_deserialize_default_duration() {
        let preset: Preset = serde_json::from_value(serde_json::json!({
            "id": "meeting",
            "name": "定例会議",
            "content": "定例会議",
            "with": "チーム",
        }))
        .unwrap();

        assert_eq!(preset.duration_minutes, 30);
        assert_eq!(preset.fields.with, "チーム");
    }

    #[test]
    fn test_find_preset_by_id_or_name() {
        let presets: Vec<Preset> = serde_json::from_value(serde_json::json!([
            {"id": "mtg", "name": "会議"},
            {"id": "doc", "name": "資料作成"},
        ]))
        .unwrap();

        assert_eq!(find_preset(&presets, "doc").map(|p| p.id.as_str()), Some("doc"));
        assert_eq!(find_preset(&presets, "会議").map(|p| p.id.as_str()), Some("mtg"));
        assert!(find_preset(&presets, "休憩").is_none());
    }
}
