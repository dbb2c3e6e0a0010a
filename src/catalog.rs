use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessStep {
    pub name: &'static str,
    pub icon: &'static str,
    pub summary: &'static str,
}

/// A fabrication topic with its static instructional content. `category` is the Korean topic
/// name used in prompts and as the default quiz history bucket.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Topic {
    pub slug: &'static str,
    pub category: &'static str,
    pub title: &'static str,
    pub overview: &'static str,
    pub key_points: &'static [&'static str],
    pub steps: &'static [ProcessStep],
}

impl Topic {
    pub fn step(&self, name: &str) -> Option<&'static ProcessStep> {
        self.steps.iter().find(|step| step.name == name)
    }
}

pub fn topics() -> &'static [Topic] {
    TOPICS
}

pub fn find(slug: &str) -> Option<&'static Topic> {
    TOPICS.iter().find(|topic| topic.slug == slug)
}

const fn step(name: &'static str, icon: &'static str, summary: &'static str) -> ProcessStep {
    ProcessStep {
        name,
        icon,
        summary,
    }
}

static TOPICS: &[Topic] = &[
    Topic {
        slug: "photolithography",
        category: "포토리소그래피",
        title: "포토리소그래피 (Photolithography)",
        overview: "웨이퍼 표면에 감광막을 바르고 노광·현상으로 패턴을 형성합니다.",
        key_points: &[
            "PR 코팅 → 소프트베이크 → 노광(EUV/DUV) → PEB → 현상 → 하드베이크 → 검사",
            "해상도(λ, NA, k1), 포커스/도즈, LER/LWR",
        ],
        steps: &[
            step(
                "웨이퍼 세정 (Wafer Clean)",
                "🧼",
                "유기물·금속 이온·파티클을 RCA/DIW/플라즈마 세정으로 제거합니다.",
            ),
            step(
                "감광막 도포 (PR Coat)",
                "🧴",
                "스핀 코팅으로 감광막을 균일하게 도포합니다.",
            ),
            step(
                "소프트 베이크 (Soft Bake)",
                "🔥",
                "감광막의 용매를 증발시켜 막을 안정화합니다.",
            ),
            step(
                "노광 (Exposure)",
                "💡",
                "마스크 패턴을 EUV/DUV 빛으로 감광막에 전사합니다.",
            ),
            step(
                "PEB (Post-Exposure Bake)",
                "♨️",
                "노광 후 베이크로 화학 반응을 안정화하고 정재파를 완화합니다.",
            ),
            step(
                "현상 (Develop)",
                "🧪",
                "현상액으로 노광 영역(또는 비노광 영역)을 제거해 패턴을 드러냅니다.",
            ),
            step(
                "하드 베이크 (Hard Bake)",
                "🧱",
                "패턴을 고정하고 내열성과 내화학성을 강화합니다.",
            ),
            step(
                "검사 (Inspection)",
                "🔍",
                "CD, 오버레이 정렬, 결함 여부를 검사합니다.",
            ),
        ],
    },
    Topic {
        slug: "etch",
        category: "식각",
        title: "식각 (Etch)",
        overview: "포토 공정으로 형성된 마스크(감광막/하드마스크)를 이용해 하부막을 선택적으로 제거하여 2D 패턴을 3D 구조로 전환하는 공정입니다. 대표적으로 플라즈마 기반의 건식 식각(RIE/ICP)과 화학 용액 기반의 습식 식각이 있으며, 선택비·이방성·CD 유지·균일도·손상 최소화가 핵심입니다.",
        key_points: &[
            "전처리 세정 → 로딩/안정화 → 본 식각 → 엔드포인트 검출 → 오버에치/보정 → 스트립/세정 → 검사/계측",
            "핵심 지표: 선택비(Selectivity), 이방성(Anisotropy), CD 유지, 손상(Charging/Notching), 균일도, 재현성, 파티클",
        ],
        steps: &[
            step(
                "전처리 세정 (Pre-clean)",
                "🧼",
                "포토/식각 잔류물과 수분을 제거하고 표면을 활성화합니다.",
            ),
            step(
                "로딩/안정화 (Conditioning)",
                "⚙️",
                "챔버를 프리컨디셔닝하고 가스·압력·파워를 안정화합니다.",
            ),
            step(
                "본 식각 (Main Etch)",
                "🧪",
                "플라즈마(건식) 또는 용액(습식) 조건으로 목표 형상을 구현합니다.",
            ),
            step(
                "엔드포인트 검출 (Endpoint)",
                "🎯",
                "OES/간섭계/전류 신호로 식각 종료 시점을 실시간 판단합니다.",
            ),
            step(
                "오버에치/보정 (Over-etch & Bias)",
                "⚖️",
                "층 두께와 장비 편차를 보상하면서 과식각을 최소화합니다.",
            ),
            step(
                "스트립/세정 (Strip & Clean)",
                "🧻",
                "애싱과 습식 세정으로 PR·폴리머·금속 잔류물을 제거합니다.",
            ),
            step(
                "검사/계측 (Inspection/Metrology)",
                "🔍",
                "CD-SEM, 프로파일, 거칠기, 전기적 손상을 평가합니다.",
            ),
        ],
    },
    Topic {
        slug: "oxidation",
        category: "산화",
        title: "산화 (Oxidation)",
        overview: "웨이퍼 표면의 Si를 산화시켜 SiO₂ 막을 형성하는 공정입니다. 게이트 산화막/필드 산화 등에서 핵심 역할을 하며, 건식(드라이)·습식(웨트) 산화, 증발/확산 속도, 두께 균일도, 계면 상태(Qf, Dit) 관리가 중요합니다.",
        key_points: &[
            "전처리 세정 → 분위기 설정 → 열 산화 → 어닐/쿨다운 → 검사/계측",
            "핵심 지표: 두께(Uniformity), 굴절률, 계면 상태(Dit/Qf), 누설, 스트레스/필름 품질",
        ],
        steps: &[
            step(
                "전처리 세정 (Pre-clean)",
                "🧼",
                "유기물·금속 이온·파티클을 제거하고 표면 수분을 관리합니다.",
            ),
            step(
                "분위기 설정 (Ox Ambient)",
                "🌫️",
                "건식(O₂) 또는 습식(H₂O) 산화 분위기를 설정합니다.",
            ),
            step(
                "열 산화 (Thermal Ox)",
                "🔥",
                "Deal–Grove 모델 기반으로 시간·온도·분압을 제어해 목표 두께를 형성합니다.",
            ),
            step(
                "어닐/쿨다운 (Anneal/Cool)",
                "🧊",
                "냉각하면서 잔류 스트레스를 완화합니다.",
            ),
            step(
                "검사/계측 (Metrology)",
                "🔍",
                "두께, 굴절률, 계면전하, 누설을 평가합니다.",
            ),
        ],
    },
    Topic {
        slug: "diffusion",
        category: "확산",
        title: "확산 (Diffusion)",
        overview: "고온 열처리를 통해 도펀트가 실리콘 벌크로 확산되어 농도 프로파일을 형성하는 공정입니다. 프리디포지션(표면 농도/도즈 형성)과 드라이브인(접합 깊이 확보)으로 나뉘며, 접합 깊이(xj), 시트저항(Rs), 표면 농도(Cs), 총 도즈(Q), 균일도, 활성화가 핵심 관리 항목입니다.",
        key_points: &[
            "전처리 세정 → 프리디포지션 → 드라이브인 → 분위기 제어 → 검사/계측",
            "핵심 지표: 접합 깊이 xj, 표면 농도 Cs, 총 도즈 Q, 시트저항 Rs, 프로파일 균일도, 활성화/결함",
        ],
        steps: &[
            step(
                "전처리 세정",
                "🧼",
                "오염·수분·네이티브 산화막 상태를 통일해 초기 계면을 최적화합니다.",
            ),
            step(
                "프리디포지션",
                "🧪",
                "도펀트 소스와 접촉시켜 표면 농도 또는 도즈를 부여합니다.",
            ),
            step(
                "드라이브인",
                "🔥",
                "고온에서 목표 접합 깊이까지 확산시키고 프로파일 형상을 제어합니다.",
            ),
            step(
                "분위기 제어",
                "🌫️",
                "산소/불활성 분위기를 선택하고 동반 산화와 막질 영향을 관리합니다.",
            ),
            step(
                "검사/계측",
                "🔍",
                "Rs, SIMS, 접합 누설로 결과를 검증하고 레시피에 반영합니다.",
            ),
        ],
    },
    Topic {
        slug: "ion-implantation",
        category: "이온주입",
        title: "이온주입 (Ion Implantation)",
        overview: "가속된 도펀트 이온(B, P, As 등)을 웨이퍼에 주입하여 원하는 깊이와 농도로 도핑하는 공정입니다. 빔 에너지·도즈·빔 각도·채널링 억제·커런트/스캔 균일도 제어가 중요하며, 주입 후 활성화 어닐(RTA/스파이크)로 전기적 활성화 및 격자 결함을 회복합니다.",
        key_points: &[
            "전처리 세정 → 이온 주입 → 각도/채널링 제어 → 활성화 어닐 → 검사/계측",
            "핵심 지표: 도즈(ions/cm²), 투영거리 Rp/분산 ΔRp, 시트저항 Rs, 활성도(액티브 도핑), 표면/격자 결함, 균일도",
        ],
        steps: &[
            step(
                "전처리 세정",
                "🧼",
                "표면 오염과 수분을 제거하고 PR/하드마스크 상태를 점검합니다.",
            ),
            step(
                "이온 주입",
                "🚀",
                "빔 에너지·도즈·스캔으로 목표 프로파일을 형성합니다.",
            ),
            step(
                "각도/채널링 제어",
                "📐",
                "틸트/트위스트로 채널링을 억제합니다.",
            ),
            step(
                "활성화 어닐",
                "🔥",
                "RTA/스파이크 어닐로 도펀트를 활성화하고 결함을 회복합니다.",
            ),
            step(
                "검사/계측",
                "🔍",
                "Rs, SIMS, 결함/누설 평가로 레시피를 피드백합니다.",
            ),
        ],
    },
    Topic {
        slug: "deposition",
        category: "증착",
        title: "증착 (CVD/PVD/ALD)",
        overview: "웨이퍼 표면에 원하는 재료의 박막을 형성하는 공정입니다. 물리적 증착(PVD: 스퍼터/증발), 화학적 증착(CVD: LPCVD/PECVD/RTCVD), 원자층 증착(ALD)을 사용하며, 조성·두께·균일도·응력·콘포멀리티·결함/파티클 관리가 핵심입니다.",
        key_points: &[
            "전처리/시드 → 막 형성 → 조건 최적화 → 후처리 → 검사/계측",
            "핵심 지표: 두께/균일도, 막질(밀도/조성/결합), 응력(인장/압축), 콘포멀리티/스텝 커버리지, 파티클/디펙트, 표면 거칠기(Ra/RMS)",
        ],
        steps: &[
            step(
                "전처리/시드",
                "🧼",
                "오염을 제거하고 표면을 활성화해 접착과 핵생성을 안정화합니다.",
            ),
            step(
                "막 형성 (PVD/CVD/ALD)",
                "🛠️",
                "목적에 맞는 증착 방식을 선택하고 레시피를 설정합니다.",
            ),
            step(
                "조건 최적화",
                "⚙️",
                "두께·조성·응력을 맞추고 입자를 최소화하도록 파라미터를 조정합니다.",
            ),
            step(
                "후처리",
                "🔥",
                "어닐이나 플라즈마 처리로 막질과 밀도를 개선합니다.",
            ),
            step(
                "검사/계측",
                "🔍",
                "두께·조성·응력·결함을 정량화해 피드백합니다.",
            ),
        ],
    },
    Topic {
        slug: "metallization",
        category: "금속배선",
        title: "금속배선 (Metallization)",
        overview: "소자 간 전기적 연결을 형성하는 공정으로, 다마신(damascene) 구조를 기반으로 포토/식각 → 배리어/라이너 → 시드 → 금속 충전(도금/증착) → CMP → 캡/패시베이션 순으로 진행됩니다. 저저항(ρ), 낮은 접촉저항(Rc), 신뢰성(EM/SM/TDDB), 공극/시임 무결점, 저유전막(Low-k) 호환성이 핵심입니다.",
        key_points: &[
            "포토/식각 → 배리어/라이너 → 시드 → 금속 충전 → CMP → 후처리/캡 → 검사/계측",
            "핵심 지표: 라인/비아 저항, 접촉저항 Rc, 공극/시임 결함, 배리어 연속성, 시드 커버리지, EM/SM 수명, 저유전막 손상, 평탄도",
        ],
        steps: &[
            step(
                "포토/식각(Trench/Via)",
                "🧩",
                "Low-k/하드마스크를 패터닝해 트렌치와 비아를 정의합니다.",
            ),
            step(
                "배리어/라이너 증착",
                "🧱",
                "Ta/TaN 등으로 확산을 막고 접착력을 높입니다.",
            ),
            step(
                "시드 증착(Seed)",
                "🌱",
                "균일한 충전을 위해 얇고 연속적인 Cu 시드를 형성합니다.",
            ),
            step(
                "금속 충전(Fill)",
                "⚡",
                "ECP 첨가제로 공극 없이 금속을 채웁니다.",
            ),
            step(
                "CMP 평탄화",
                "🧽",
                "과충전된 금속을 제거하고 표면을 평탄화합니다.",
            ),
            step(
                "후처리/캡",
                "🛡️",
                "어닐과 캡층으로 저항과 EM 신뢰성을 개선합니다.",
            ),
            step(
                "검사/계측",
                "🔍",
                "비아/라인 저항, EM·TDDB, 결함 맵을 평가합니다.",
            ),
        ],
    },
];
