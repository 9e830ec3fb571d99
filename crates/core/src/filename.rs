use crate::error::FilenameError;
use regex::Regex;

/// Identity segments extracted verbatim from a medical filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicalFileInfo {
    pub expediente: String,
    pub nombre_paciente: String,
    pub numero_episodio: String,
    pub categoria: String,
}

/// Clinic-area codes accepted in the category segment.
pub const VALID_CATEGORIES: [(&str, &str); 8] = [
    ("EMER", "Emergencia"),
    ("CONS", "Consulta"),
    ("LAB", "Laboratorio"),
    ("RAD", "Radiología"),
    ("CIRC", "Cirugía"),
    ("HOSP", "Hospitalización"),
    ("UCI", "Unidad de Cuidados Intensivos"),
    ("URG", "Urgencias"),
];

pub(crate) const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "png", "jpg", "jpeg", "tiff"];

/// Parser for `{expediente}_{nombre_paciente}_{numero_episodio}_{categoria}.{ext}`.
///
/// Pure with respect to its input: no I/O, no external state. Parsing
/// failures are explicit results, never panics; the pipeline records them on
/// the document instead of aborting.
pub struct FilenameParser {
    pattern: Regex,
}

impl Default for FilenameParser {
    fn default() -> Self {
        // Coarse shape only; segment-level checks produce the specific error.
        // Expediente and episodio are 10 digits in the upstream clinical
        // system, category codes are 3-4 uppercase letters.
        let pattern = Regex::new(r"^(\d{10})_([A-ZÁÉÍÓÚÑÜ\s,]+)_(\d{10})_([A-Z]{3,4})$")
            .expect("static filename pattern must compile");
        Self { pattern }
    }
}

impl FilenameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, filename: &str) -> Result<MedicalFileInfo, FilenameError> {
        let stem = strip_extension(filename)?;

        let Some(captures) = self.pattern.captures(stem) else {
            return Err(analyze_mismatch(filename, stem));
        };

        let expediente = captures[1].to_string();
        let nombre_paciente = captures[2].trim().to_string();
        let numero_episodio = captures[3].to_string();
        let categoria = captures[4].to_string();

        validate_expediente(&expediente)?;
        validate_patient_name(&nombre_paciente)?;
        validate_categoria(&categoria)?;

        Ok(MedicalFileInfo {
            expediente,
            nombre_paciente,
            numero_episodio,
            categoria,
        })
    }
}

fn strip_extension(filename: &str) -> Result<&str, FilenameError> {
    let (stem, extension) = filename
        .rsplit_once('.')
        .ok_or_else(|| FilenameError::MissingExtension(filename.to_string()))?;

    if !SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| extension.eq_ignore_ascii_case(supported))
    {
        return Err(FilenameError::UnsupportedExtension {
            filename: filename.to_string(),
            extension: extension.to_string(),
        });
    }

    Ok(stem)
}

/// The coarse pattern rejected the stem; work out which segment is at fault
/// so the recorded error names the actual problem.
fn analyze_mismatch(filename: &str, stem: &str) -> FilenameError {
    let parts: Vec<&str> = stem.split('_').collect();

    if parts.len() != 4 {
        return FilenameError::SegmentCount {
            filename: filename.to_string(),
            found: parts.len(),
        };
    }

    let [expediente, paciente, episodio, categoria] = [parts[0], parts[1], parts[2], parts[3]];

    for (segment, name) in [
        (expediente, "expediente"),
        (paciente, "nombre_paciente"),
        (episodio, "numero_episodio"),
        (categoria, "categoria"),
    ] {
        if segment.trim().is_empty() {
            return FilenameError::EmptySegment {
                filename: filename.to_string(),
                segment: name,
            };
        }
    }

    if expediente.len() != 10 || !expediente.chars().all(|c| c.is_ascii_digit()) {
        return FilenameError::InvalidExpediente(expediente.to_string());
    }

    if episodio.len() != 10 || !episodio.chars().all(|c| c.is_ascii_digit()) {
        return FilenameError::InvalidEpisodio(episodio.to_string());
    }

    if let Err(error) = validate_categoria(categoria) {
        return error;
    }

    FilenameError::InvalidPatientName(paciente.trim().to_string())
}

fn validate_expediente(expediente: &str) -> Result<(), FilenameError> {
    if expediente == "0000000000" {
        return Err(FilenameError::InvalidExpediente(expediente.to_string()));
    }
    Ok(())
}

fn validate_patient_name(name: &str) -> Result<(), FilenameError> {
    let Some((apellidos, nombres)) = name.split_once(',') else {
        return Err(FilenameError::InvalidPatientName(name.to_string()));
    };

    if apellidos.trim().is_empty() || nombres.trim().is_empty() || nombres.contains(',') {
        return Err(FilenameError::InvalidPatientName(name.to_string()));
    }

    Ok(())
}

fn validate_categoria(categoria: &str) -> Result<(), FilenameError> {
    let known = VALID_CATEGORIES
        .iter()
        .any(|(code, _)| *code == categoria);

    if known {
        Ok(())
    } else {
        Err(FilenameError::UnknownCategory {
            found: categoria.to_string(),
            valid: VALID_CATEGORIES
                .iter()
                .map(|(code, _)| *code)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}
