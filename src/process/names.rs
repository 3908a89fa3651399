use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Fold the accented Latin letters that show up in SESNSP headers to ASCII.
fn fold_ascii(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Normalize a header to lowercase snake case:
/// - trim, lowercase and fold accents (`Año` → `ano`)
/// - every run of other characters becomes a single `_`
/// - leading/trailing `_` are dropped
pub fn clean_name(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .map(fold_ascii)
        .collect();
    NON_ALNUM
        .replace_all(&folded, "_")
        .trim_matches('_')
        .to_string()
}

pub fn clean_names<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    headers.into_iter().map(clean_name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sesnsp_headers() {
        let headers = [
            "Año",
            "Clave_Ent",
            "Cve. Municipio",
            "Bien jurídico afectado",
            "Subtipo de delito",
            "Enero",
            "SEPTIEMBRE",
            " Diciembre ",
        ];
        assert_eq!(
            clean_names(headers),
            vec![
                "ano",
                "clave_ent",
                "cve_municipio",
                "bien_juridico_afectado",
                "subtipo_de_delito",
                "enero",
                "septiembre",
                "diciembre",
            ]
        );
    }

    #[test]
    fn collapses_separators_and_bom() {
        assert_eq!(clean_name("\u{feff}Año"), "ano");
        assert_eq!(clean_name("--Modalidad  (tipo)--"), "modalidad_tipo");
        assert_eq!(clean_name("Niño/Niña"), "nino_nina");
        assert_eq!(clean_name("***"), "");
    }
}
