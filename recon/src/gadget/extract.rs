use num_complex::Complex32;
use mr_data::{EncodingParameters, Image, ImageType};
use crate::error::Result;
use crate::gadget::{invalid, parse_bool, pass, unknown, Gadget, Message};

/// Derives real valued images (magnitude, real, imaginary, phase) from complex
/// ones, or passes the complex image on. Each selected part becomes its own
/// image tagged with the matching image type.
pub struct ExtractGadget {
    magnitude:bool,
    real:bool,
    imag:bool,
    phase:bool,
    complex:bool,
}

impl ExtractGadget {
    pub fn new() -> Self {
        Self {
            magnitude:true,
            real:false,
            imag:false,
            phase:false,
            complex:false,
        }
    }

    fn selected(&self) -> Vec<ImageType> {
        [
            (self.magnitude,ImageType::Magnitude),
            (self.real,ImageType::Real),
            (self.imag,ImageType::Imag),
            (self.phase,ImageType::Phase),
            (self.complex,ImageType::Complex),
        ].into_iter().filter(|(on,_)| *on).map(|(_,t)| t).collect()
    }
}

pub fn extract(image:&Image,image_type:ImageType) -> Image {
    let f:fn(Complex32) -> Complex32 = match image_type {
        ImageType::Magnitude => |z| Complex32::new(z.norm(),0.0),
        ImageType::Real => |z| Complex32::new(z.re,0.0),
        ImageType::Imag => |z| Complex32::new(z.im,0.0),
        ImageType::Phase => |z| Complex32::new(z.arg(),0.0),
        ImageType::Complex => |z| z,
    };
    let mut out = image.clone();
    out.data.mapv_inplace(f);
    out.head.image_type = image_type.code();
    out
}

impl Gadget for ExtractGadget {
    fn class_name(&self) -> &'static str {
        "ExtractGadget"
    }

    fn set_property(&mut self,key:&str,value:&str) -> Result<()> {
        let part = match key {
            "extract_magnitude" => &mut self.magnitude,
            "extract_real" => &mut self.real,
            "extract_imag" => &mut self.imag,
            "extract_phase" => &mut self.phase,
            "extract_complex" => &mut self.complex,
            _=> return Err(unknown("ExtractGadget",key))
        };
        *part = parse_bool(key,value)?;
        Ok(())
    }

    fn configure(&mut self,_encoding:&mut EncodingParameters) -> Result<()> {
        if self.selected().is_empty() {
            return Err(invalid("extract_magnitude","false"))
        }
        Ok(())
    }

    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()> {
        match msg {
            Message::Image(image) => {
                for t in self.selected() {
                    out.push(Message::Image(extract(&image,t)));
                }
                Ok(())
            }
            other => pass(other,out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use mr_data::ImageHeader;

    fn image() -> Image {
        let mut head = ImageHeader::default();
        head.matrix_size = [2,1,1];
        Image::new(head,Array4::from_elem((1,1,1,2),Complex32::new(3.0,-4.0))).unwrap()
    }

    fn run(g:&mut ExtractGadget) -> Vec<Image> {
        let mut out = vec![];
        g.process(Message::Image(image()),&mut out).unwrap();
        out.into_iter().map(|m| match m {
            Message::Image(i) => i,
            _=> panic!("expected an image")
        }).collect()
    }

    #[test]
    fn magnitude_by_default(){
        let imgs = run(&mut ExtractGadget::new());
        assert_eq!(imgs.len(),1);
        assert_eq!(imgs[0].head.image_type,ImageType::Magnitude.code());
        assert_eq!(imgs[0].data[[0,0,0,1]],Complex32::new(5.0,0.0));
    }

    #[test]
    fn one_image_per_selected_part(){
        let mut g = ExtractGadget::new();
        g.set_property("extract_real","true").unwrap();
        g.set_property("extract_imag","true").unwrap();
        g.set_property("extract_complex","true").unwrap();
        let imgs = run(&mut g);
        let types:Vec<u16> = imgs.iter().map(|i| i.head.image_type).collect();
        assert_eq!(types,vec![1,3,4,5]);
        assert_eq!(imgs[2].data[[0,0,0,0]].re,-4.0);
        assert_eq!(imgs[3].data,image().data);
    }

    #[test]
    fn nothing_selected_is_a_configuration_error(){
        let mut g = ExtractGadget::new();
        g.set_property("extract_magnitude","false").unwrap();
        let mut e = EncodingParameters::cartesian_2d(2,2,10.0,1);
        assert!(g.configure(&mut e).is_err());
    }
}
