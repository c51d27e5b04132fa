use lectin_core::scoring::Psm;
use rayon::prelude::*;

use crate::Runner;

impl Runner {
    fn serialize_psm(&self, psm: &Psm) -> csv::ByteRecord {
        let mut record = csv::ByteRecord::new();
        record.push_field(psm.spec_id.as_bytes());
        record.push_field(psm.peptide.as_bytes());
        record.push_field(psm.protein.as_bytes());
        record.push_field(psm.glycan.as_bytes());
        record.push_field(psm.glycan_class.as_str().as_bytes());
        record.push_field(itoa::Buffer::new().format(psm.rank).as_bytes());
        record.push_field(itoa::Buffer::new().format(psm.label()).as_bytes());
        record.push_field(ryu::Buffer::new().format(psm.expmass).as_bytes());
        record.push_field(ryu::Buffer::new().format(psm.calcmass).as_bytes());
        record.push_field(itoa::Buffer::new().format(psm.charge).as_bytes());
        record.push_field(ryu::Buffer::new().format(psm.rt).as_bytes());
        record.push_field(ryu::Buffer::new().format(psm.ppm_error).as_bytes());
        record.push_field(
            itoa::Buffer::new()
                .format(psm.missed_cleavages)
                .as_bytes(),
        );
        record.push_field(ryu::Buffer::new().format(psm.sp).as_bytes());
        record.push_field(itoa::Buffer::new().format(psm.matched_peaks).as_bytes());
        record.push_field(ryu::Buffer::new().format(psm.xcorr).as_bytes());
        record.push_field(ryu::Buffer::new().format(psm.q_value).as_bytes());
        record
    }

    pub fn write_psms(&self, psms: &[Psm]) -> anyhow::Result<String> {
        let path = self.make_path("results.lectin.tsv");

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);

        let headers = csv::ByteRecord::from(vec![
            "scannr",
            "peptide",
            "protein",
            "glycan",
            "glycan_class",
            "rank",
            "label",
            "expmass",
            "calcmass",
            "charge",
            "rt",
            "precursor_ppm",
            "missed_cleavages",
            "sp",
            "matched_peaks",
            "xcorr",
            "q_value",
        ]);

        wtr.write_byte_record(&headers)?;
        for record in psms
            .par_iter()
            .map(|psm| self.serialize_psm(psm))
            .collect::<Vec<_>>()
        {
            wtr.write_byte_record(&record)?;
        }

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        std::fs::write(&path, bytes)?;
        Ok(path.to_string_lossy().into_owned())
    }
}
