//! Canonical patient-name form shared by ingestion and search.
//!
//! Both sides must agree on one surface, so the stored search key and the
//! query term go through the same function. The stored `"APELLIDOS,
//! NOMBRES"` ordering is the canonical ordering; names are never reordered.

/// Map a raw patient-name string to its canonical comparison key.
///
/// Uppercases, folds diacritics, drops punctuation except comma and space,
/// collapses whitespace and canonicalizes comma spacing. Idempotent:
/// normalizing an already-normalized string returns it unchanged.
pub fn normalize_patient_name(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());

    for ch in raw.trim().chars() {
        let folded = fold_diacritic(ch).to_ascii_uppercase();

        match folded {
            'A'..='Z' | '0'..='9' => cleaned.push(folded),
            ',' => cleaned.push(','),
            c if c.is_whitespace() => cleaned.push(' '),
            c if c.is_alphabetic() => cleaned.extend(c.to_uppercase()),
            _ => {}
        }
    }

    // Collapse runs of spaces and pin commas to "X, Y" spacing.
    let mut result = String::with_capacity(cleaned.len());
    let mut previous_space = false;
    for ch in cleaned.chars() {
        match ch {
            ' ' => {
                if !previous_space && !result.is_empty() {
                    result.push(' ');
                }
                previous_space = true;
            }
            ',' => {
                while result.ends_with(' ') {
                    result.pop();
                }
                result.push(',');
                result.push(' ');
                previous_space = true;
            }
            other => {
                result.push(other);
                previous_space = false;
            }
        }
    }

    result.trim_end_matches([' ', ',']).to_string()
}

/// Word tokens of a normalized name, comma and space separated.
pub fn name_tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split([' ', ','])
        .filter(|token| !token.is_empty())
        .collect()
}

fn fold_diacritic(ch: char) -> char {
    match ch {
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'á' | 'à' | 'â' | 'ä' | 'ã' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' | 'é' | 'è' | 'ê' | 'ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' | 'í' | 'ì' | 'î' | 'ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' | 'ú' | 'ù' | 'û' | 'ü' => 'U',
        'Ñ' | 'ñ' => 'N',
        'Ç' | 'ç' => 'C',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{name_tokens, normalize_patient_name};

    #[test]
    fn uppercases_and_collapses_whitespace() {
        assert_eq!(
            normalize_patient_name("  garcia   lopez ,  maria "),
            "GARCIA LOPEZ, MARIA"
        );
    }

    #[test]
    fn folds_diacritics() {
        assert_eq!(
            normalize_patient_name("PEÑA GÓMEZ, JOSÉ ANGÉL"),
            "PENA GOMEZ, JOSE ANGEL"
        );
    }

    #[test]
    fn strips_punctuation_except_comma_and_space() {
        assert_eq!(
            normalize_patient_name("O'BRIEN-SMITH, ANA."),
            "OBRIENSMITH, ANA"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "ALANIS VILLAGRAN, MARIA DE LOS ANGELES",
            "  péña ,josé  ",
            "ya normalizado",
            "",
            ", ,",
        ];
        for input in inputs {
            let once = normalize_patient_name(input);
            assert_eq!(normalize_patient_name(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn trailing_comma_is_dropped() {
        assert_eq!(normalize_patient_name("GARCIA,"), "GARCIA");
    }

    #[test]
    fn tokens_split_on_space_and_comma() {
        assert_eq!(
            name_tokens("ALANIS VILLAGRAN, MARIA"),
            vec!["ALANIS", "VILLAGRAN", "MARIA"]
        );
    }
}
