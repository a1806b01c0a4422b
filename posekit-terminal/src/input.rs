/// Keyboard routing for the annotation terminal
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// One of the six pose fields a nudge acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
    W,
    P,
    R,
}

impl Axis {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'x' => Some(Axis::X),
            'y' => Some(Axis::Y),
            'z' => Some(Axis::Z),
            'w' => Some(Axis::W),
            'p' => Some(Axis::P),
            'r' => Some(Axis::R),
            _ => None,
        }
    }

    pub fn is_rotation(self) -> bool {
        matches!(self, Axis::W | Axis::P | Axis::R)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Quit,
    Save,
    /// Nudge the relative pose along `axis`, `sign` is +1 or -1
    Nudge { axis: Axis, sign: f64 },
    PrevImage,
    NextImage,
    /// Zero-based image index
    ShowImage(usize),
    NewPart,
    DuplicatePart,
    NextPart,
    RemovePart,
    /// Point the selected placement at the next CAD part of the dataset
    CycleAssignedPart,
    NewCorrespondence,
    PrevCorrespondence,
    NextCorrespondence,
    RemoveCorrespondence,
    ToggleSnap,
    MoveCursor { dx: i32, dy: i32 },
    StorePixel,
    PickPoint,
    /// Write the solver request for the current correspondences
    RequestSolve,
    /// Read the solver's answer back into the relative pose
    LoadSolvedPose,
}

pub fn route(key: KeyEvent) -> Option<Command> {
    let shifted = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Char('s') => Some(Command::Save),
        KeyCode::Char('h') => Some(Command::PrevImage),
        KeyCode::Char('j') => Some(Command::NextImage),
        KeyCode::Char('n') => Some(Command::NewPart),
        KeyCode::Char('d') => Some(Command::DuplicatePart),
        KeyCode::Tab => Some(Command::NextPart),
        KeyCode::Delete => Some(Command::RemovePart),
        KeyCode::Char('a') => Some(Command::CycleAssignedPart),
        KeyCode::Char('c') => Some(Command::NewCorrespondence),
        KeyCode::Char('[') => Some(Command::PrevCorrespondence),
        KeyCode::Char(']') => Some(Command::NextCorrespondence),
        KeyCode::Backspace => Some(Command::RemoveCorrespondence),
        KeyCode::Enter => Some(Command::RequestSolve),
        KeyCode::Char('l') => Some(Command::LoadSolvedPose),
        KeyCode::Char('t') => Some(Command::ToggleSnap),
        KeyCode::Char(' ') => Some(Command::StorePixel),
        KeyCode::Char('m') => Some(Command::PickPoint),
        KeyCode::Char(c @ '1'..='9') => c
            .to_digit(10)
            .map(|n| Command::ShowImage(n as usize - 1)),
        KeyCode::Char(c) => {
            let axis = Axis::from_char(c)?;
            let sign = if c.is_ascii_uppercase() || shifted { -1.0 } else { 1.0 };
            Some(Command::Nudge { axis, sign })
        }
        KeyCode::Left => Some(Command::MoveCursor { dx: -1, dy: 0 }),
        KeyCode::Right => Some(Command::MoveCursor { dx: 1, dy: 0 }),
        KeyCode::Up => Some(Command::MoveCursor { dx: 0, dy: -1 }),
        KeyCode::Down => Some(Command::MoveCursor { dx: 0, dy: 1 }),
        _ => None,
    }
}
