use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::EvalError;

/// Short language codes as used by translation packages, and the FLORES-200
/// file code holding that language. Several short codes may share one file.
const LANGUAGES: &[(&str, &str)] = &[
    ("af", "afr_Latn"),
    ("ak", "aka_Latn"),
    ("am", "amh_Ethi"),
    ("ar", "arb_Arab"),
    ("as", "asm_Beng"),
    ("ay", "ayr_Latn"),
    ("az", "azj_Latn"),
    ("bm", "bam_Latn"),
    ("be", "bel_Cyrl"),
    ("bn", "ben_Beng"),
    ("bho", "bho_Deva"),
    ("bs", "bos_Latn"),
    ("bg", "bul_Cyrl"),
    ("ca", "cat_Latn"),
    ("ceb", "ceb_Latn"),
    ("cs", "ces_Latn"),
    ("ckb", "ckb_Arab"),
    ("tt", "crh_Latn"),
    ("cy", "cym_Latn"),
    ("da", "dan_Latn"),
    ("de", "deu_Latn"),
    ("el", "ell_Grek"),
    ("en", "eng_Latn"),
    ("eo", "epo_Latn"),
    ("et", "est_Latn"),
    ("eu", "eus_Latn"),
    ("ee", "ewe_Latn"),
    ("fa", "pes_Arab"),
    ("fi", "fin_Latn"),
    ("fr", "fra_Latn"),
    ("gd", "gla_Latn"),
    ("ga", "gle_Latn"),
    ("gl", "glg_Latn"),
    ("gn", "grn_Latn"),
    ("gu", "guj_Gujr"),
    ("ht", "hat_Latn"),
    ("ha", "hau_Latn"),
    ("he", "heb_Hebr"),
    ("hi", "hin_Deva"),
    ("hr", "hrv_Latn"),
    ("hu", "hun_Latn"),
    ("hy", "hye_Armn"),
    ("nl", "nld_Latn"),
    ("ig", "ibo_Latn"),
    ("ilo", "ilo_Latn"),
    ("id", "ind_Latn"),
    ("is", "isl_Latn"),
    ("it", "ita_Latn"),
    ("jv", "jav_Latn"),
    ("ja", "jpn_Jpan"),
    ("kn", "kan_Knda"),
    ("ka", "kat_Geor"),
    ("kk", "kaz_Cyrl"),
    ("km", "khm_Khmr"),
    ("rw", "kin_Latn"),
    ("ko", "kor_Hang"),
    ("ku", "kmr_Latn"),
    ("lo", "lao_Laoo"),
    ("lv", "lvs_Latn"),
    ("ln", "lin_Latn"),
    ("lt", "lit_Latn"),
    ("lb", "ltz_Latn"),
    ("lg", "lug_Latn"),
    ("lus", "lus_Latn"),
    ("mai", "mai_Deva"),
    ("ml", "mal_Mlym"),
    ("mr", "mar_Deva"),
    ("mk", "mkd_Cyrl"),
    ("mg", "plt_Latn"),
    ("mt", "mlt_Latn"),
    ("mni-Mtei", "mni_Beng"),
    ("mni", "mni_Beng"),
    ("mn", "khk_Cyrl"),
    ("mi", "mri_Latn"),
    ("ms", "zsm_Latn"),
    ("my", "mya_Mymr"),
    ("no", "nno_Latn"),
    ("ne", "npi_Deva"),
    ("ny", "nya_Latn"),
    ("om", "gaz_Latn"),
    ("or", "ory_Orya"),
    ("pl", "pol_Latn"),
    ("pt", "por_Latn"),
    ("ps", "pbt_Arab"),
    ("qu", "quy_Latn"),
    ("ro", "ron_Latn"),
    ("ru", "rus_Cyrl"),
    ("sa", "san_Deva"),
    ("si", "sin_Sinh"),
    ("sk", "slk_Latn"),
    ("sl", "slv_Latn"),
    ("sm", "smo_Latn"),
    ("sn", "sna_Latn"),
    ("sd", "snd_Arab"),
    ("so", "som_Latn"),
    ("es", "spa_Latn"),
    ("sq", "als_Latn"),
    ("sr", "srp_Cyrl"),
    ("su", "sun_Latn"),
    ("sv", "swe_Latn"),
    ("sw", "swh_Latn"),
    ("ta", "tam_Taml"),
    ("te", "tel_Telu"),
    ("tg", "tgk_Cyrl"),
    ("tl", "tgl_Latn"),
    ("th", "tha_Thai"),
    ("ti", "tir_Ethi"),
    ("ts", "tso_Latn"),
    ("tk", "tuk_Latn"),
    ("tr", "tur_Latn"),
    ("ug", "uig_Arab"),
    ("uk", "ukr_Cyrl"),
    ("ur", "urd_Arab"),
    ("uz", "uzn_Latn"),
    ("vi", "vie_Latn"),
    ("xh", "xho_Latn"),
    ("yi", "ydd_Hebr"),
    ("yo", "yor_Latn"),
    ("zh-CN", "zho_Hans"),
    ("zh", "zho_Hans"),
    ("zh-TW", "zho_Hant"),
    ("zu", "zul_Latn"),
    ("pa", "pan_Guru"),
];

static TO_FLORES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| LANGUAGES.iter().copied().collect());

static FROM_FLORES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for &(code, flores) in LANGUAGES {
        map.entry(flores).or_insert(code);
    }
    map
});

/// `en` -> `eng_Latn`.
pub fn to_flores(code: &str) -> Result<&'static str, EvalError> {
    TO_FLORES
        .get(code)
        .copied()
        .ok_or_else(|| EvalError::UnknownLanguage(code.to_string()))
}

/// `eng_Latn` -> `en`. Aliases resolve to the first code in table order.
pub fn from_flores(flores: &str) -> Option<&'static str> {
    FROM_FLORES.get(flores).copied()
}

pub fn supported_codes() -> impl Iterator<Item = &'static str> {
    LANGUAGES.iter().map(|&(code, _)| code)
}

/// A translation direction, written `from-to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguagePair {
    pub from: String,
    pub to: String,
}

impl LanguagePair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// FLORES codes for both sides.
    pub fn flores_codes(&self) -> Result<(&'static str, &'static str), EvalError> {
        Ok((to_flores(&self.from)?, to_flores(&self.to)?))
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

impl FromStr for LanguagePair {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('-') {
            Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok(Self::new(from, to)),
            _ => Err(EvalError::InvalidModelSpec(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_code_resolves() {
        for code in supported_codes() {
            let flores = to_flores(code).unwrap();
            assert!(!flores.is_empty(), "{} maps to an empty code", code);
        }
    }

    #[test]
    fn unknown_codes_fail() {
        for code in ["xx", "", "EN", "eng_Latn"] {
            assert!(matches!(to_flores(code), Err(EvalError::UnknownLanguage(_))));
        }
    }

    #[test]
    fn aliases_share_files() {
        assert_eq!(to_flores("zh").unwrap(), "zho_Hans");
        assert_eq!(to_flores("zh-CN").unwrap(), "zho_Hans");
        assert_eq!(to_flores("zh-TW").unwrap(), "zho_Hant");
        assert_eq!(from_flores("zho_Hans"), Some("zh-CN"));
        assert_eq!(from_flores("mni_Beng"), Some("mni-Mtei"));
        assert_eq!(from_flores("eng_Latn"), Some("en"));
        assert_eq!(from_flores("xxx_Xxxx"), None);
    }

    #[test]
    fn pair_parsing() {
        let pair: LanguagePair = "en-it".parse().unwrap();
        assert_eq!(pair, LanguagePair::new("en", "it"));
        assert_eq!(pair.to_string(), "en-it");
        assert_eq!(pair.flores_codes().unwrap(), ("eng_Latn", "ita_Latn"));

        let pair: LanguagePair = "en-zh-TW".parse().unwrap();
        assert_eq!(pair.to, "zh-TW");

        assert!("en".parse::<LanguagePair>().is_err());
        assert!("-it".parse::<LanguagePair>().is_err());
    }
}
