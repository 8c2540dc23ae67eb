use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer as XmlWriter;
use tracing::info;

use mzcore::data::spectrum::{MsLevel, Scan};

use crate::errors::Result;
use crate::errors::SimError;
use crate::io::properties_csv::write_peak_properties_path;
use crate::sim::dda::AcquisitionRun;
use crate::sim::properties::PeakProperties;

/// Fixed activation reported for every fragment spectrum.
const COLLISION_ENERGY: f64 = 25.0;

fn scan_ref(id: u32) -> String {
    format!("controllerType=0 controllerNumber=1 scan={}", id)
}

/// Serializes an acquisition run as mzML 1.1: every scan as a spectrum
/// element with zlib-compressed base64 binary arrays, plus one total ion
/// current chromatogram over the survey scans.
pub struct MzmlWriter<W: Write> {
    xml: XmlWriter<W>,
}

impl<W: Write> MzmlWriter<W> {
    pub fn new(inner: W) -> Self {
        MzmlWriter {
            xml: XmlWriter::new_with_indent(inner, b' ', 2),
        }
    }

    /// Write the complete document. Framing, spectra and the chromatogram
    /// are emitted in one pass; any error aborts the document.
    pub fn write_run(&mut self, run: &AcquisitionRun) -> Result<()> {
        self.xml
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut mzml = BytesStart::new("mzML");
        mzml.push_attribute(("xmlns", "http://psi.hupo.org/ms/mzml"));
        mzml.push_attribute(("version", "1.1.0"));
        self.xml.write_event(Event::Start(mzml))?;

        self.write_header()?;

        let mut run_el = BytesStart::new("run");
        run_el.push_attribute(("id", "Simulated_Run"));
        run_el.push_attribute(("defaultInstrumentConfigurationRef", "IC1"));
        self.xml.write_event(Event::Start(run_el))?;

        let mut spectrum_list = BytesStart::new("spectrumList");
        let count = run.scan_count().to_string();
        spectrum_list.push_attribute(("count", count.as_str()));
        spectrum_list.push_attribute(("defaultDataProcessingRef", "DP1"));
        self.xml.write_event(Event::Start(spectrum_list))?;
        for (index, scan) in run.scans().enumerate() {
            self.write_spectrum(scan, index)?;
        }
        self.xml.write_event(Event::End(BytesEnd::new("spectrumList")))?;

        let time: Vec<f64> = run.cycles.iter().map(|c| c.ms1.retention_time).collect();
        let tic: Vec<f64> = run.cycles.iter().map(|c| c.ms1.total_ion_current()).collect();
        self.write_chromatogram(&time, &tic)?;

        self.xml.write_event(Event::End(BytesEnd::new("run")))?;
        self.xml.write_event(Event::End(BytesEnd::new("mzML")))?;
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let mut cv_list = BytesStart::new("cvList");
        cv_list.push_attribute(("count", "2"));
        self.xml.write_event(Event::Start(cv_list))?;
        let mut ms_cv = BytesStart::new("cv");
        ms_cv.push_attribute(("id", "MS"));
        ms_cv.push_attribute((
            "fullName",
            "Proteomics Standards Initiative Mass Spectrometry Ontology",
        ));
        ms_cv.push_attribute((
            "URI",
            "https://raw.githubusercontent.com/HUPO-PSI/psi-ms-CV/master/psi-ms.obo",
        ));
        self.xml.write_event(Event::Empty(ms_cv))?;
        let mut uo_cv = BytesStart::new("cv");
        uo_cv.push_attribute(("id", "UO"));
        uo_cv.push_attribute(("fullName", "Unit Ontology"));
        uo_cv.push_attribute((
            "URI",
            "https://raw.githubusercontent.com/bio-ontology-research-group/unit-ontology/master/unit.obo",
        ));
        self.xml.write_event(Event::Empty(uo_cv))?;
        self.xml.write_event(Event::End(BytesEnd::new("cvList")))?;

        self.xml.write_event(Event::Start(BytesStart::new("fileDescription")))?;
        self.xml.write_event(Event::Start(BytesStart::new("fileContent")))?;
        self.write_cv_param("MS", "MS:1000579", "MS1 spectrum", None, None)?;
        self.write_cv_param("MS", "MS:1000580", "MSn spectrum", None, None)?;
        self.xml.write_event(Event::End(BytesEnd::new("fileContent")))?;
        self.xml.write_event(Event::End(BytesEnd::new("fileDescription")))?;

        let mut software_list = BytesStart::new("softwareList");
        software_list.push_attribute(("count", "1"));
        self.xml.write_event(Event::Start(software_list))?;
        let mut software = BytesStart::new("software");
        software.push_attribute(("id", "mzgen"));
        software.push_attribute(("version", env!("CARGO_PKG_VERSION")));
        self.xml.write_event(Event::Start(software))?;
        self.write_cv_param("MS", "MS:1000799", "custom unreleased software tool", Some("mzgen"), None)?;
        self.xml.write_event(Event::End(BytesEnd::new("software")))?;
        self.xml.write_event(Event::End(BytesEnd::new("softwareList")))?;

        let mut ic_list = BytesStart::new("instrumentConfigurationList");
        ic_list.push_attribute(("count", "1"));
        self.xml.write_event(Event::Start(ic_list))?;
        let mut ic = BytesStart::new("instrumentConfiguration");
        ic.push_attribute(("id", "IC1"));
        self.xml.write_event(Event::Start(ic))?;
        self.write_cv_param("MS", "MS:1000031", "instrument model", None, None)?;
        self.xml
            .write_event(Event::End(BytesEnd::new("instrumentConfiguration")))?;
        self.xml
            .write_event(Event::End(BytesEnd::new("instrumentConfigurationList")))?;

        let mut dp_list = BytesStart::new("dataProcessingList");
        dp_list.push_attribute(("count", "1"));
        self.xml.write_event(Event::Start(dp_list))?;
        let mut dp = BytesStart::new("dataProcessing");
        dp.push_attribute(("id", "DP1"));
        self.xml.write_event(Event::Start(dp))?;
        let mut method = BytesStart::new("processingMethod");
        method.push_attribute(("order", "1"));
        method.push_attribute(("softwareRef", "mzgen"));
        self.xml.write_event(Event::Start(method))?;
        self.write_cv_param("MS", "MS:1000544", "Conversion to mzML", None, None)?;
        self.xml.write_event(Event::End(BytesEnd::new("processingMethod")))?;
        self.xml.write_event(Event::End(BytesEnd::new("dataProcessing")))?;
        self.xml.write_event(Event::End(BytesEnd::new("dataProcessingList")))?;
        Ok(())
    }

    fn write_cv_param(
        &mut self,
        cv_ref: &str,
        accession: &str,
        name: &str,
        value: Option<&str>,
        unit: Option<(&str, &str, &str)>,
    ) -> Result<()> {
        let mut param = BytesStart::new("cvParam");
        param.push_attribute(("cvRef", cv_ref));
        param.push_attribute(("accession", accession));
        param.push_attribute(("name", name));
        if let Some(value) = value {
            param.push_attribute(("value", value));
        }
        if let Some((unit_cv, unit_accession, unit_name)) = unit {
            param.push_attribute(("unitCvRef", unit_cv));
            param.push_attribute(("unitAccession", unit_accession));
            param.push_attribute(("unitName", unit_name));
        }
        self.xml.write_event(Event::Empty(param))?;
        Ok(())
    }

    fn write_spectrum(&mut self, scan: &Scan, index: usize) -> Result<()> {
        let mut spectrum = BytesStart::new("spectrum");
        let index_attr = index.to_string();
        let id_attr = scan_ref(scan.id);
        let length_attr = scan.spectrum.len().to_string();
        spectrum.push_attribute(("index", index_attr.as_str()));
        spectrum.push_attribute(("id", id_attr.as_str()));
        spectrum.push_attribute(("defaultArrayLength", length_attr.as_str()));
        self.xml.write_event(Event::Start(spectrum))?;

        let tic = scan.total_ion_current().to_string();
        match scan.ms_level {
            MsLevel::Ms1 => {
                self.write_cv_param("MS", "MS:1000579", "MS1 spectrum", None, None)?;
                self.write_cv_param("MS", "MS:1000511", "ms level", Some("1"), None)?;
            }
            MsLevel::Ms2 => {
                self.write_cv_param("MS", "MS:1000580", "MSn spectrum", None, None)?;
                self.write_cv_param("MS", "MS:1000511", "ms level", Some("2"), None)?;
            }
        }
        self.write_cv_param("MS", "MS:1000127", "centroid spectrum", None, None)?;
        self.write_cv_param("MS", "MS:1000285", "total ion current", Some(&tic), None)?;
        if scan.ms_level == MsLevel::Ms1 {
            let (base_mz, base_intensity) = scan.spectrum.base_peak().unwrap_or((0.0, 0.0));
            self.write_cv_param(
                "MS",
                "MS:1000504",
                "base peak m/z",
                Some(&base_mz.to_string()),
                Some(("MS", "MS:1000040", "m/z")),
            )?;
            self.write_cv_param(
                "MS",
                "MS:1000505",
                "base peak intensity",
                Some(&base_intensity.to_string()),
                Some(("MS", "MS:1000131", "number of detector counts")),
            )?;
        }

        let mut scan_list = BytesStart::new("scanList");
        scan_list.push_attribute(("count", "1"));
        self.xml.write_event(Event::Start(scan_list))?;
        self.write_cv_param("MS", "MS:1000795", "no combination", None, None)?;
        self.xml.write_event(Event::Start(BytesStart::new("scan")))?;
        self.write_cv_param(
            "MS",
            "MS:1000016",
            "scan start time",
            Some(&scan.retention_time.to_string()),
            Some(("UO", "UO:0000010", "second")),
        )?;
        self.xml.write_event(Event::End(BytesEnd::new("scan")))?;
        self.xml.write_event(Event::End(BytesEnd::new("scanList")))?;

        if let Some(precursor) = &scan.precursor {
            let mut precursor_list = BytesStart::new("precursorList");
            precursor_list.push_attribute(("count", "1"));
            self.xml.write_event(Event::Start(precursor_list))?;
            let mut precursor_el = BytesStart::new("precursor");
            let precursor_ref = scan_ref(precursor.scan_id);
            precursor_el.push_attribute(("spectrumRef", precursor_ref.as_str()));
            self.xml.write_event(Event::Start(precursor_el))?;

            let mut ion_list = BytesStart::new("selectedIonList");
            ion_list.push_attribute(("count", "1"));
            self.xml.write_event(Event::Start(ion_list))?;
            self.xml.write_event(Event::Start(BytesStart::new("selectedIon")))?;
            self.write_cv_param(
                "MS",
                "MS:1000744",
                "selected ion m/z",
                Some(&precursor.mz.to_string()),
                Some(("MS", "MS:1000040", "m/z")),
            )?;
            self.write_cv_param(
                "MS",
                "MS:1000041",
                "charge state",
                Some(&precursor.charge.to_string()),
                None,
            )?;
            self.write_cv_param(
                "MS",
                "MS:1000042",
                "peak intensity",
                Some(&precursor.intensity.to_string()),
                Some(("MS", "MS:1000131", "number of detector counts")),
            )?;
            self.xml.write_event(Event::End(BytesEnd::new("selectedIon")))?;
            self.xml.write_event(Event::End(BytesEnd::new("selectedIonList")))?;

            self.xml.write_event(Event::Start(BytesStart::new("activation")))?;
            self.write_cv_param(
                "MS",
                "MS:1000422",
                "beam-type collision-induced dissociation",
                None,
                None,
            )?;
            self.write_cv_param(
                "MS",
                "MS:1000045",
                "collision energy",
                Some(&COLLISION_ENERGY.to_string()),
                Some(("UO", "UO:0000266", "electronvolt")),
            )?;
            self.xml.write_event(Event::End(BytesEnd::new("activation")))?;

            self.xml.write_event(Event::End(BytesEnd::new("precursor")))?;
            self.xml.write_event(Event::End(BytesEnd::new("precursorList")))?;
        }

        let mut array_list = BytesStart::new("binaryDataArrayList");
        array_list.push_attribute(("count", "2"));
        self.xml.write_event(Event::Start(array_list))?;
        self.write_binary_array(&scan.spectrum.mz, true)?;
        self.write_binary_array(&scan.spectrum.intensity, false)?;
        self.xml.write_event(Event::End(BytesEnd::new("binaryDataArrayList")))?;

        self.xml.write_event(Event::End(BytesEnd::new("spectrum")))?;
        Ok(())
    }

    fn write_binary_array(&mut self, values: &[f64], is_mz: bool) -> Result<()> {
        let encoded = encode_f64_array(values)?;
        let mut array = BytesStart::new("binaryDataArray");
        let length_attr = encoded.len().to_string();
        array.push_attribute(("encodedLength", length_attr.as_str()));
        self.xml.write_event(Event::Start(array))?;
        self.write_cv_param("MS", "MS:1000523", "64-bit float", None, None)?;
        self.write_cv_param("MS", "MS:1000574", "zlib compression", None, None)?;
        if is_mz {
            self.write_cv_param(
                "MS",
                "MS:1000514",
                "m/z array",
                None,
                Some(("MS", "MS:1000040", "m/z")),
            )?;
        } else {
            self.write_cv_param(
                "MS",
                "MS:1000515",
                "intensity array",
                None,
                Some(("MS", "MS:1000131", "number of detector counts")),
            )?;
        }
        self.xml.write_event(Event::Start(BytesStart::new("binary")))?;
        self.xml.write_event(Event::Text(BytesText::new(&encoded)))?;
        self.xml.write_event(Event::End(BytesEnd::new("binary")))?;
        self.xml.write_event(Event::End(BytesEnd::new("binaryDataArray")))?;
        Ok(())
    }

    fn write_chromatogram(&mut self, time: &[f64], intensity: &[f64]) -> Result<()> {
        let mut chromatogram_list = BytesStart::new("chromatogramList");
        chromatogram_list.push_attribute(("count", "1"));
        chromatogram_list.push_attribute(("defaultDataProcessingRef", "DP1"));
        self.xml.write_event(Event::Start(chromatogram_list))?;

        let mut chromatogram = BytesStart::new("chromatogram");
        let length_attr = time.len().to_string();
        chromatogram.push_attribute(("index", "0"));
        chromatogram.push_attribute(("id", "TIC"));
        chromatogram.push_attribute(("defaultArrayLength", length_attr.as_str()));
        self.xml.write_event(Event::Start(chromatogram))?;
        self.write_cv_param("MS", "MS:1000235", "total ion current chromatogram", None, None)?;

        let mut array_list = BytesStart::new("binaryDataArrayList");
        array_list.push_attribute(("count", "2"));
        self.xml.write_event(Event::Start(array_list))?;

        let encoded_time = encode_f64_array(time)?;
        let mut time_array = BytesStart::new("binaryDataArray");
        let time_length = encoded_time.len().to_string();
        time_array.push_attribute(("encodedLength", time_length.as_str()));
        self.xml.write_event(Event::Start(time_array))?;
        self.write_cv_param("MS", "MS:1000523", "64-bit float", None, None)?;
        self.write_cv_param("MS", "MS:1000574", "zlib compression", None, None)?;
        self.write_cv_param(
            "MS",
            "MS:1000595",
            "time array",
            None,
            Some(("UO", "UO:0000010", "second")),
        )?;
        self.xml.write_event(Event::Start(BytesStart::new("binary")))?;
        self.xml.write_event(Event::Text(BytesText::new(&encoded_time)))?;
        self.xml.write_event(Event::End(BytesEnd::new("binary")))?;
        self.xml.write_event(Event::End(BytesEnd::new("binaryDataArray")))?;

        let encoded_intensity = encode_f64_array(intensity)?;
        let mut intensity_array = BytesStart::new("binaryDataArray");
        let intensity_length = encoded_intensity.len().to_string();
        intensity_array.push_attribute(("encodedLength", intensity_length.as_str()));
        self.xml.write_event(Event::Start(intensity_array))?;
        self.write_cv_param("MS", "MS:1000523", "64-bit float", None, None)?;
        self.write_cv_param("MS", "MS:1000574", "zlib compression", None, None)?;
        self.write_cv_param(
            "MS",
            "MS:1000515",
            "intensity array",
            None,
            Some(("MS", "MS:1000131", "number of detector counts")),
        )?;
        self.xml.write_event(Event::Start(BytesStart::new("binary")))?;
        self.xml.write_event(Event::Text(BytesText::new(&encoded_intensity)))?;
        self.xml.write_event(Event::End(BytesEnd::new("binary")))?;
        self.xml.write_event(Event::End(BytesEnd::new("binaryDataArray")))?;

        self.xml.write_event(Event::End(BytesEnd::new("binaryDataArrayList")))?;
        self.xml.write_event(Event::End(BytesEnd::new("chromatogram")))?;
        self.xml.write_event(Event::End(BytesEnd::new("chromatogramList")))?;
        Ok(())
    }
}

/// Little-endian f64, zlib, base64: the standard mzML binary encoding.
fn encode_f64_array(values: &[f64]) -> Result<String> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for &value in values {
        bytes.write_f64::<LittleEndian>(value)?;
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&bytes)?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// Write the run to `path` and the post-defaulting molecule summary next to
/// it. Returns the mzML path.
pub fn write_mzml(
    path: &Path,
    run: &AcquisitionRun,
    properties: &[PeakProperties],
) -> Result<PathBuf> {
    info!(scans = run.scan_count(), "start writing mzML");
    let started = Instant::now();

    let file = File::create(path).map_err(|source| SimError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    let mut buffered = BufWriter::new(file);
    {
        let mut writer = MzmlWriter::new(&mut buffered);
        writer.write_run(run)?;
    }
    buffered.flush()?;

    let summary_path = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("molecule_summary.csv");
    write_peak_properties_path(&summary_path, properties)?;

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "finished writing mzML"
    );
    Ok(path.to_path_buf())
}
